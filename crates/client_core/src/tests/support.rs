//! Recording fakes shared by the client_core test modules.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::domain::{SlotIndex, VisualPhase};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use url::Url;

use crate::{
    presentation::{DiagnosticSink, Presentation},
    transport::{Link, LinkConnector, LinkEvent},
};

enum Script {
    Reject(String),
    Accept(UnboundedReceiver<LinkEvent>),
}

/// Connector that replays scripted outcomes and refuses once the script runs
/// out.
#[derive(Default)]
pub(crate) struct FakeConnector {
    scripts: Mutex<VecDeque<Script>>,
    connects: AtomicUsize,
}

impl FakeConnector {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn push_reject(&self, reason: &str) {
        self.scripts
            .lock()
            .expect("scripts")
            .push_back(Script::Reject(reason.to_string()));
    }

    pub(crate) fn push_accept(&self) -> UnboundedSender<LinkEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.scripts
            .lock()
            .expect("scripts")
            .push_back(Script::Accept(rx));
        tx
    }

    pub(crate) fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LinkConnector for FakeConnector {
    async fn connect(&self, _url: &Url) -> Result<Box<dyn Link>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.lock().expect("scripts").pop_front();
        match script {
            Some(Script::Accept(rx)) => Ok(Box::new(FakeLink { rx })),
            Some(Script::Reject(reason)) => Err(anyhow!(reason)),
            None => Err(anyhow!("connection refused")),
        }
    }
}

struct FakeLink {
    rx: UnboundedReceiver<LinkEvent>,
}

#[async_trait]
impl Link for FakeLink {
    async fn next_event(&mut self) -> LinkEvent {
        self.rx.recv().await.unwrap_or(LinkEvent::Closed(None))
    }

    async fn close(&mut self) {
        self.rx.close();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    TriggerEnabled(bool),
    Phase(VisualPhase),
    Telemetry {
        fps: u32,
        confidence_pct: u32,
        gesture_total: u64,
    },
    Pulse(SlotIndex, Duration),
    SpawnUnits(usize),
    TrackPointer,
    TrackUnits,
    MediaFeed(String),
    ResetDecorations,
}

#[derive(Default)]
pub(crate) struct RecordingPresentation {
    calls: Mutex<Vec<Call>>,
}

impl RecordingPresentation {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record(&self, call: Call) {
        self.calls.lock().expect("calls").push(call);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls").clone()
    }

    pub(crate) fn clear(&self) {
        self.calls.lock().expect("calls").clear();
    }

    pub(crate) fn telemetry(&self) -> Vec<(u32, u32, u64)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Telemetry {
                    fps,
                    confidence_pct,
                    gesture_total,
                } => Some((fps, confidence_pct, gesture_total)),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn pulses(&self) -> Vec<SlotIndex> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Pulse(slot, _) => Some(slot),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn phases(&self) -> Vec<VisualPhase> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Phase(phase) => Some(phase),
                _ => None,
            })
            .collect()
    }
}

impl Presentation for RecordingPresentation {
    fn set_trigger_enabled(&self, enabled: bool) {
        self.record(Call::TriggerEnabled(enabled));
    }

    fn set_phase_visual(&self, phase: VisualPhase) {
        self.record(Call::Phase(phase));
    }

    fn render_telemetry(&self, fps: u32, confidence_pct: u32, gesture_total: u64) {
        self.record(Call::Telemetry {
            fps,
            confidence_pct,
            gesture_total,
        });
    }

    fn pulse_gesture_slot(&self, slot: SlotIndex, duration: Duration) {
        self.record(Call::Pulse(slot, duration));
    }

    fn spawn_tracking_units(&self, count: usize) {
        self.record(Call::SpawnUnits(count));
    }

    fn track_pointer(&self) {
        self.record(Call::TrackPointer);
    }

    fn track_units_periodically(&self) {
        self.record(Call::TrackUnits);
    }

    fn show_media_feed(&self, url: &Url) {
        self.record(Call::MediaFeed(url.to_string()));
    }

    fn reset_decorations(&self) {
        self.record(Call::ResetDecorations);
    }
}

#[derive(Default)]
pub(crate) struct RecordingDiagnostics {
    reports: Mutex<Vec<String>>,
}

impl RecordingDiagnostics {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn reports(&self) -> Vec<String> {
        self.reports.lock().expect("reports").clone()
    }

    pub(crate) fn clear(&self) {
        self.reports.lock().expect("reports").clear();
    }
}

impl DiagnosticSink for RecordingDiagnostics {
    fn report(&self, message: &str) {
        self.reports
            .lock()
            .expect("reports")
            .push(message.to_string());
    }
}
