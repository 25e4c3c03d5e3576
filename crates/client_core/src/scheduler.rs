use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

/// Handle to a delayed send. Cancelling it guarantees the input is never
/// delivered by this timer; inputs already queued are filtered by epoch at
/// the receiver.
#[derive(Debug)]
pub(crate) struct ScheduledTask {
    cancel: CancellationToken,
}

impl ScheduledTask {
    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }
}

pub(crate) fn schedule<T: Send + 'static>(
    delay: Duration,
    tx: UnboundedSender<T>,
    input: T,
) -> ScheduledTask {
    let cancel = CancellationToken::new();
    let guard = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = guard.cancelled() => {}
            _ = tokio::time::sleep(delay) => {
                if !guard.is_cancelled() {
                    let _ = tx.send(input);
                }
            }
        }
    });
    ScheduledTask { cancel }
}
