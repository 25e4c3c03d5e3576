//! Collaborators the session drives but does not implement.

use std::time::Duration;

use shared::domain::{SlotIndex, VisualPhase};
use url::Url;

/// Render hooks owned by the presentation layer.
///
/// Calls are fire-and-forget: implementations must return promptly and must
/// not call back into the session.
pub trait Presentation: Send + Sync {
    fn set_trigger_enabled(&self, enabled: bool);
    fn set_phase_visual(&self, phase: VisualPhase);
    fn render_telemetry(&self, fps: u32, confidence_pct: u32, gesture_total: u64);
    fn pulse_gesture_slot(&self, slot: SlotIndex, duration: Duration);
    fn spawn_tracking_units(&self, count: usize);
    fn track_pointer(&self);
    fn track_units_periodically(&self);
    fn show_media_feed(&self, url: &Url);
    fn reset_decorations(&self);
}

pub trait DiagnosticSink: Send + Sync {
    fn report(&self, message: &str);
}

/// Diagnostic sink that forwards reports to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl DiagnosticSink for TracingDiagnostics {
    fn report(&self, message: &str) {
        tracing::info!(target: "eye::diagnostics", "{message}");
    }
}
