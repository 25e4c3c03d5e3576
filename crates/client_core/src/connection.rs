//! Realtime link lifecycle: connect, receive, drop, reconnect.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use shared::{
    domain::ConnectionStatus,
    error::PipelineError,
    protocol::{decode_frame, NormalizedEvent},
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::{
    scheduler::{schedule, ScheduledTask},
    transport::{LinkConnector, LinkEvent},
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    pub retry_count: u32,
    pub last_error: Option<PipelineError>,
}

/// Signals reported by the task that owns the transport for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkSignal {
    Opened,
    Rejected(String),
    Frame(String),
    Error(String),
    Closed(Option<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionInput {
    Link { attempt: u64, signal: LinkSignal },
    ReconnectDue { attempt: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionOutput {
    Connected,
    Disconnected,
    Event(NormalizedEvent),
    Diagnostic(String),
}

pub struct ConnectionManager {
    state: ConnectionState,
    connector: Arc<dyn LinkConnector>,
    url: Url,
    reconnect_delay: Duration,
    attempt: u64,
    starts: u64,
    link: Option<CancellationToken>,
    reconnect: Option<ScheduledTask>,
    tx: UnboundedSender<ConnectionInput>,
}

impl ConnectionManager {
    pub fn new(
        connector: Arc<dyn LinkConnector>,
        url: Url,
        reconnect_delay: Duration,
    ) -> (Self, UnboundedReceiver<ConnectionInput>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                state: ConnectionState::default(),
                connector,
                url,
                reconnect_delay,
                attempt: 0,
                starts: 0,
                link: None,
                reconnect: None,
                tx,
            },
            rx,
        )
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn status(&self) -> ConnectionStatus {
        self.state.status
    }

    pub fn retry_count(&self) -> u32 {
        self.state.retry_count
    }

    pub fn is_reconnect_scheduled(&self) -> bool {
        self.reconnect.is_some()
    }

    /// Number of `start()` calls that actually initiated a link.
    pub fn starts(&self) -> u64 {
        self.starts
    }

    /// Initiates a link attempt. No-op while connecting or open.
    pub fn start(&mut self) {
        if matches!(
            self.state.status,
            ConnectionStatus::Connecting | ConnectionStatus::Open
        ) {
            debug!(status = ?self.state.status, "link: start ignored");
            return;
        }
        if let Some(pending) = self.reconnect.take() {
            pending.cancel();
        }

        self.attempt += 1;
        self.starts += 1;
        self.state.status = ConnectionStatus::Connecting;

        let cancel = CancellationToken::new();
        tokio::spawn(drive_link(
            Arc::clone(&self.connector),
            self.url.clone(),
            self.attempt,
            self.tx.clone(),
            cancel.clone(),
        ));
        self.link = Some(cancel);
        info!(attempt = self.attempt, url = %self.url, "link: connecting");
    }

    /// Forces `Closed` from any state and cancels a pending reconnect.
    /// Inputs already queued for the old attempt are ignored afterwards.
    pub fn stop(&mut self) {
        if let Some(pending) = self.reconnect.take() {
            pending.cancel();
        }
        if let Some(link) = self.link.take() {
            link.cancel();
        }
        if self.state.status != ConnectionStatus::Closed {
            debug!(attempt = self.attempt, status = ?self.state.status, "link: stopped");
        }
        self.attempt += 1;
        self.state.status = ConnectionStatus::Closed;
    }

    /// Stops and returns to the freshly constructed state.
    pub fn reset(&mut self) {
        self.stop();
        self.state = ConnectionState::default();
        self.starts = 0;
    }

    /// Single dispatcher for everything the link task and the reconnect
    /// timer report. `session_active` gates the reconnect policy.
    pub fn handle(&mut self, input: ConnectionInput, session_active: bool) -> Vec<ConnectionOutput> {
        match input {
            ConnectionInput::ReconnectDue { attempt } => self.on_reconnect_due(attempt, session_active),
            ConnectionInput::Link { attempt, signal } => {
                if attempt != self.attempt {
                    trace!(attempt, current = self.attempt, "link: stale signal dropped");
                    return Vec::new();
                }
                match signal {
                    LinkSignal::Opened => self.on_opened(),
                    LinkSignal::Frame(text) => self.on_frame(&text),
                    LinkSignal::Error(reason) => self.on_error(reason),
                    LinkSignal::Rejected(reason) => self.on_closed(
                        PipelineError::TransportRejected {
                            url: self.url.to_string(),
                            reason,
                        },
                        session_active,
                    ),
                    LinkSignal::Closed(reason) => {
                        let reason = reason
                            .or_else(|| match &self.state.last_error {
                                Some(PipelineError::TransportDropped { reason }) => Some(reason.clone()),
                                _ => None,
                            })
                            .unwrap_or_else(|| "closed by peer".to_string());
                        self.on_closed(PipelineError::TransportDropped { reason }, session_active)
                    }
                }
            }
        }
    }

    fn on_opened(&mut self) -> Vec<ConnectionOutput> {
        if self.state.status != ConnectionStatus::Connecting {
            return Vec::new();
        }
        self.state.status = ConnectionStatus::Open;
        self.state.retry_count = 0;
        self.state.last_error = None;
        info!(attempt = self.attempt, "link: connected");
        vec![
            ConnectionOutput::Diagnostic("link connected".to_string()),
            ConnectionOutput::Connected,
        ]
    }

    fn on_frame(&mut self, text: &str) -> Vec<ConnectionOutput> {
        if self.state.status != ConnectionStatus::Open {
            return Vec::new();
        }
        match decode_frame(text, Utc::now()) {
            Ok(event) => {
                trace!(kind = event.kind(), "link: frame decoded");
                vec![ConnectionOutput::Event(event)]
            }
            Err(err) => {
                warn!(error = %err, "link: frame dropped");
                vec![ConnectionOutput::Diagnostic(err.to_string())]
            }
        }
    }

    fn on_error(&mut self, reason: String) -> Vec<ConnectionOutput> {
        warn!(attempt = self.attempt, %reason, "link: transport error");
        let message = format!("link error: {reason}");
        self.state.last_error = Some(PipelineError::TransportDropped { reason });
        vec![ConnectionOutput::Diagnostic(message)]
    }

    fn on_closed(&mut self, error: PipelineError, session_active: bool) -> Vec<ConnectionOutput> {
        let was_open = match self.state.status {
            ConnectionStatus::Open => true,
            ConnectionStatus::Connecting => false,
            ConnectionStatus::Disconnected | ConnectionStatus::Closed => return Vec::new(),
        };

        self.state.status = ConnectionStatus::Closed;
        self.link = None;
        warn!(attempt = self.attempt, error = %error, "link: closed");

        let mut outputs = vec![ConnectionOutput::Diagnostic(error.to_string())];
        self.state.last_error = Some(error);
        if was_open {
            outputs.push(ConnectionOutput::Disconnected);
        }

        if session_active {
            self.state.retry_count += 1;
            self.reconnect = Some(schedule(
                self.reconnect_delay,
                self.tx.clone(),
                ConnectionInput::ReconnectDue {
                    attempt: self.attempt,
                },
            ));
            info!(
                retry_count = self.state.retry_count,
                delay_ms = self.reconnect_delay.as_millis() as u64,
                "link: reconnect scheduled"
            );
            outputs.push(ConnectionOutput::Diagnostic(format!(
                "reconnecting in {}ms",
                self.reconnect_delay.as_millis()
            )));
        }
        outputs
    }

    fn on_reconnect_due(&mut self, attempt: u64, session_active: bool) -> Vec<ConnectionOutput> {
        if attempt != self.attempt || self.reconnect.is_none() {
            trace!(attempt, current = self.attempt, "link: stale reconnect dropped");
            return Vec::new();
        }
        self.reconnect = None;
        if !session_active || self.state.status != ConnectionStatus::Closed {
            return Vec::new();
        }
        self.start();
        vec![ConnectionOutput::Diagnostic(format!(
            "reconnect attempt {}",
            self.state.retry_count
        ))]
    }
}

async fn drive_link(
    connector: Arc<dyn LinkConnector>,
    url: Url,
    attempt: u64,
    tx: UnboundedSender<ConnectionInput>,
    cancel: CancellationToken,
) {
    let send = |signal: LinkSignal| tx.send(ConnectionInput::Link { attempt, signal }).is_ok();

    let connected = tokio::select! {
        _ = cancel.cancelled() => return,
        result = connector.connect(&url) => result,
    };
    let mut link = match connected {
        Ok(link) => link,
        Err(err) => {
            send(LinkSignal::Rejected(format!("{err:#}")));
            return;
        }
    };
    if !send(LinkSignal::Opened) {
        link.close().await;
        return;
    }

    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => {
                link.close().await;
                return;
            }
            event = link.next_event() => event,
        };
        let (signal, finished) = match event {
            LinkEvent::Text(text) => (LinkSignal::Frame(text), false),
            LinkEvent::Error(reason) => (LinkSignal::Error(reason), false),
            LinkEvent::Closed(reason) => (LinkSignal::Closed(reason), true),
        };
        if !send(signal) || finished {
            break;
        }
    }
}

#[cfg(test)]
#[path = "tests/connection_tests.rs"]
mod tests;
