//! Headless presentation layer: every render hook becomes a log line.

use std::{sync::Mutex, time::Duration};

use client_core::Presentation;
use shared::domain::{SlotIndex, VisualPhase, GESTURE_SLOT_COUNT};
use tracing::{debug, info};
use url::Url;

#[derive(Debug, Default)]
pub struct ConsolePresentation {
    pulses: Mutex<[u64; GESTURE_SLOT_COUNT]>,
}

impl ConsolePresentation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pulses seen per slot since start.
    pub fn pulse_counts(&self) -> [u64; GESTURE_SLOT_COUNT] {
        match self.pulses.lock() {
            Ok(pulses) => *pulses,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

fn phase_label(phase: VisualPhase) -> &'static str {
    match phase {
        VisualPhase::Dormant => "dormant",
        VisualPhase::Closed => "eye closed",
        VisualPhase::Awakened => "awakened",
        VisualPhase::Closing => "closing",
    }
}

impl Presentation for ConsolePresentation {
    fn set_trigger_enabled(&self, enabled: bool) {
        debug!(enabled, "console: trigger");
    }

    fn set_phase_visual(&self, phase: VisualPhase) {
        info!(phase = phase_label(phase), "console: phase");
    }

    fn render_telemetry(&self, fps: u32, confidence_pct: u32, gesture_total: u64) {
        info!(fps, confidence = %format!("{confidence_pct}%"), gesture_total, "console: telemetry");
    }

    fn pulse_gesture_slot(&self, slot: SlotIndex, duration: Duration) {
        let mut pulses = match self.pulses.lock() {
            Ok(pulses) => pulses,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(count) = pulses.get_mut(slot.0) {
            *count += 1;
        }
        info!(slot = slot.0, duration_ms = duration.as_millis() as u64, "console: gesture");
    }

    fn spawn_tracking_units(&self, count: usize) {
        info!(count, "console: tracking units spawned");
    }

    fn track_pointer(&self) {
        debug!("console: pointer tracking on");
    }

    fn track_units_periodically(&self) {
        debug!("console: unit tracking on");
    }

    fn show_media_feed(&self, url: &Url) {
        info!(%url, "console: media feed available");
    }

    fn reset_decorations(&self) {
        info!("console: decorations cleared");
    }
}
