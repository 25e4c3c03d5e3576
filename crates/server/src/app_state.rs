use std::time::Duration;

use shared::protocol::{BackendFrame, StatsPayload};
use tokio::sync::{broadcast, watch};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) stats: watch::Receiver<StatsPayload>,
    pub(crate) commands: broadcast::Sender<BackendFrame>,
    pub(crate) stats_interval: Duration,
}
