use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::PipelineError;

/// Aggregate counters carried by a `stats` frame. Missing or `null`
/// counters read as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsPayload {
    #[serde(default, deserialize_with = "null_as_default")]
    pub fps: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub gesture_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detection_count: Option<u64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub confidence: f64,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Frames pushed by the gesture backend over the realtime link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendFrame {
    Stats {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<f64>,
        stats: StatsPayload,
    },
    GestureCommand {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<f64>,
        command: String,
        #[serde(default)]
        parameters: Map<String, Value>,
    },
}

impl BackendFrame {
    pub const STATS: &'static str = "stats";
    pub const GESTURE_COMMAND: &'static str = "gesture_command";

    pub fn stats(stats: StatsPayload, at: DateTime<Utc>) -> Self {
        Self::Stats {
            timestamp: Some(epoch_seconds(at)),
            stats,
        }
    }

    pub fn gesture_command(command: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self::GestureCommand {
            timestamp: Some(epoch_seconds(at)),
            command: command.into(),
            parameters: Map::new(),
        }
    }

    pub fn into_event(self, received_at: DateTime<Utc>) -> NormalizedEvent {
        match self {
            Self::Stats { stats, .. } => NormalizedEvent::Telemetry(Telemetry::new(
                stats.fps,
                stats.confidence,
                stats.gesture_count,
            )),
            Self::GestureCommand {
                timestamp, command, ..
            } => NormalizedEvent::GestureCommand {
                command,
                timestamp: timestamp
                    .and_then(from_epoch_seconds)
                    .unwrap_or(received_at),
            },
        }
    }
}

/// Sanitized telemetry snapshot: `fps >= 0`, `confidence` within `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Telemetry {
    pub fps: f64,
    pub confidence: f64,
    pub gesture_total: u64,
}

impl Telemetry {
    pub fn new(fps: f64, confidence: f64, gesture_total: u64) -> Self {
        let fps = if fps.is_finite() { fps.max(0.0) } else { 0.0 };
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            fps,
            confidence,
            gesture_total,
        }
    }

    pub fn rounded_fps(&self) -> u32 {
        self.fps.round() as u32
    }

    pub fn confidence_percent(&self) -> u32 {
        (self.confidence * 100.0).round() as u32
    }
}

/// Transport-agnostic event produced by the live link or the simulation.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedEvent {
    Telemetry(Telemetry),
    GestureCommand {
        command: String,
        timestamp: DateTime<Utc>,
    },
}

impl NormalizedEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Telemetry(_) => "telemetry",
            Self::GestureCommand { .. } => "gesture_command",
        }
    }
}

/// Decodes one inbound text frame.
///
/// Payloads that are not JSON are `FrameUnparseable`; JSON without a known
/// `type`, or with a known `type` but an invalid body, is `FrameUnrecognized`.
pub fn decode_frame(text: &str, received_at: DateTime<Utc>) -> Result<NormalizedEvent, PipelineError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|err| PipelineError::FrameUnparseable(err.to_string()))?;

    match value.get("type").and_then(Value::as_str) {
        Some(BackendFrame::STATS) | Some(BackendFrame::GESTURE_COMMAND) => {}
        Some(other) => {
            return Err(PipelineError::FrameUnrecognized(format!(
                "unknown type `{other}`"
            )))
        }
        None => {
            return Err(PipelineError::FrameUnrecognized(
                "missing `type` discriminator".to_string(),
            ))
        }
    }

    let frame: BackendFrame = serde_json::from_value(value)
        .map_err(|err| PipelineError::FrameUnrecognized(err.to_string()))?;
    Ok(frame.into_event(received_at))
}

fn epoch_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp_micros() as f64 / 1_000_000.0
}

fn from_epoch_seconds(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    let whole = seconds.trunc();
    let nanos = ((seconds - whole) * 1_000_000_000.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
