//! Synthetic telemetry and gesture events used while no live link is open.

use std::ops::Range;
use std::time::Duration;

use chrono::Utc;
use rand::{rngs::StdRng, Rng, SeedableRng};
use shared::{
    domain::SlotIndex,
    protocol::{NormalizedEvent, Telemetry},
};
use tokio::{
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::{event_mapper::EventMapper, settings::PipelineSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationInput {
    Tick { generation: u64 },
}

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub poll_interval: Duration,
    pub fps: Range<f64>,
    pub confidence: Range<f64>,
    pub gesture_probability: f64,
    pub seed: Option<u64>,
}

impl From<&PipelineSettings> for SimulationConfig {
    fn from(settings: &PipelineSettings) -> Self {
        Self {
            poll_interval: settings.poll_interval(),
            fps: settings.simulated_fps_min..settings.simulated_fps_max,
            confidence: settings.simulated_confidence_min..settings.simulated_confidence_max,
            gesture_probability: settings.simulation_gesture_probability,
            seed: settings.simulation_seed,
        }
    }
}

pub struct SimulationSource {
    config: SimulationConfig,
    mapper: EventMapper,
    rng: StdRng,
    generation: u64,
    ticker: Option<CancellationToken>,
    gesture_total: u64,
    tx: UnboundedSender<SimulationInput>,
}

impl SimulationSource {
    pub fn new(
        config: SimulationConfig,
        mapper: EventMapper,
    ) -> (Self, UnboundedReceiver<SimulationInput>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let rng = seeded_rng(config.seed);
        (
            Self {
                config,
                mapper,
                rng,
                generation: 0,
                ticker: None,
                gesture_total: 0,
                tx,
            },
            rx,
        )
    }

    pub fn is_running(&self) -> bool {
        self.ticker.is_some()
    }

    pub fn gesture_total(&self) -> u64 {
        self.gesture_total
    }

    /// Starts the poll ticker. No-op while already running.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        self.generation += 1;
        let generation = self.generation;
        let cancel = CancellationToken::new();
        let guard = cancel.clone();
        let tx = self.tx.clone();
        let period = self.config.poll_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = guard.cancelled() => break,
                    _ = interval.tick() => {
                        if guard.is_cancelled()
                            || tx.send(SimulationInput::Tick { generation }).is_err()
                        {
                            break;
                        }
                    }
                }
            }
        });
        self.ticker = Some(cancel);
        debug!(generation, "simulation: started");
    }

    /// Halts emission. Ticks already queued are discarded by `handle`.
    pub fn stop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.cancel();
            self.generation += 1;
            debug!(generation = self.generation, "simulation: stopped");
        }
    }

    /// Stops and returns to the freshly constructed state.
    pub fn reset(&mut self) {
        self.stop();
        self.gesture_total = 0;
        self.rng = seeded_rng(self.config.seed);
    }

    pub fn handle(&mut self, input: SimulationInput) -> Vec<NormalizedEvent> {
        match input {
            SimulationInput::Tick { generation } => {
                if !self.is_running() || generation != self.generation {
                    trace!(generation, current = self.generation, "simulation: stale tick dropped");
                    return Vec::new();
                }
                self.tick()
            }
        }
    }

    /// Produces one tick of synthetic data: always a telemetry sample, and
    /// occasionally a gesture command for a uniformly chosen slot. Samples
    /// are truncated to whole frames and whole percentage points.
    pub fn tick(&mut self) -> Vec<NormalizedEvent> {
        let gesture = self.roll_gesture();
        if gesture.is_some() {
            self.gesture_total += 1;
        }

        let fps = self.rng.gen_range(self.config.fps.clone()).floor();
        let confidence = (self.rng.gen_range(self.config.confidence.clone()) * 100.0).floor() / 100.0;
        let mut events = vec![NormalizedEvent::Telemetry(Telemetry::new(
            fps,
            confidence,
            self.gesture_total,
        ))];
        if let Some(command) = gesture {
            events.push(NormalizedEvent::GestureCommand {
                command,
                timestamp: Utc::now(),
            });
        }
        events
    }

    fn roll_gesture(&mut self) -> Option<String> {
        let slots = self.mapper.slot_count();
        if slots == 0 || !self.rng.gen_bool(self.config.gesture_probability) {
            return None;
        }
        let slot = SlotIndex(self.rng.gen_range(0..slots));
        self.mapper.canonical_command(slot).map(str::to_owned)
    }
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

#[cfg(test)]
#[path = "tests/simulation_tests.rs"]
mod tests;
