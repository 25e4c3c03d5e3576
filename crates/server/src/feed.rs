//! Synthetic detection feed standing in for the camera pipeline.

use std::time::Duration;

use chrono::Utc;
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use shared::protocol::{BackendFrame, StatsPayload};
use tokio::{
    sync::{broadcast, watch},
    time::{Instant, MissedTickBehavior},
};
use tracing::{debug, info};

/// Commands the stand-in backend emits. Includes one the client has no slot
/// for, like the reference backend's fallback loop.
pub(crate) const FEED_COMMANDS: &[&str] = &[
    "peace",
    "stop",
    "thumbs_up",
    "thumbs_down",
    "fist",
    "point",
    "swipe_left",
    "arms_up",
    "simulated_gesture",
];

const FPS_WINDOW: Duration = Duration::from_secs(1);

pub(crate) struct SyntheticDetector {
    rng: StdRng,
    gesture_probability: f64,
    confidence: f64,
    frames: u32,
    window_start: Instant,
    stats: StatsPayload,
}

impl SyntheticDetector {
    pub(crate) fn new(gesture_probability: f64, confidence: f64, seed: Option<u64>, now: Instant) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            gesture_probability: if gesture_probability.is_finite() {
                gesture_probability.clamp(0.0, 1.0)
            } else {
                0.0
            },
            confidence,
            frames: 0,
            window_start: now,
            stats: StatsPayload {
                detection_count: Some(0),
                ..StatsPayload::default()
            },
        }
    }

    pub(crate) fn stats(&self) -> &StatsPayload {
        &self.stats
    }

    /// Accounts for one captured frame; returns a command when a gesture
    /// fires on this frame.
    pub(crate) fn on_frame(&mut self, now: Instant) -> Option<&'static str> {
        self.frames += 1;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed >= FPS_WINDOW {
            self.stats.fps = f64::from(self.frames) / elapsed.as_secs_f64();
            self.frames = 0;
            self.window_start = now;
        }
        self.stats.confidence = self.confidence;

        if !self.rng.gen_bool(self.gesture_probability) {
            return None;
        }
        self.stats.gesture_count += 1;
        FEED_COMMANDS.choose(&mut self.rng).copied()
    }
}

pub(crate) async fn run_feed(
    mut detector: SyntheticDetector,
    frame_interval: Duration,
    stats_tx: watch::Sender<StatsPayload>,
    commands: broadcast::Sender<BackendFrame>,
) {
    info!(frame_interval_ms = frame_interval.as_millis() as u64, "feed: started");
    let mut ticker = tokio::time::interval(frame_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        let now = ticker.tick().await;
        if let Some(command) = detector.on_frame(now) {
            debug!(command, "feed: gesture");
            // No subscribers is fine; frames are only pushed to open sockets.
            let _ = commands.send(BackendFrame::gesture_command(command, Utc::now()));
        }
        if stats_tx.send(detector.stats().clone()).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_is_measured_over_a_one_second_window() {
        let start = Instant::now();
        let mut detector = SyntheticDetector::new(0.0, 0.9, Some(1), start);
        for frame in 1..=50u64 {
            detector.on_frame(start + Duration::from_millis(frame * 20));
        }
        assert_eq!(detector.stats().fps, 50.0);
        assert_eq!(detector.stats().confidence, 0.9);
        assert_eq!(detector.stats().gesture_count, 0);
    }

    #[test]
    fn every_fired_gesture_is_counted() {
        let start = Instant::now();
        let mut detector = SyntheticDetector::new(1.0, 0.9, Some(3), start);
        for frame in 1..=10u64 {
            let command = detector
                .on_frame(start + Duration::from_millis(frame))
                .expect("gesture");
            assert!(FEED_COMMANDS.contains(&command));
        }
        assert_eq!(detector.stats().gesture_count, 10);
    }
}
