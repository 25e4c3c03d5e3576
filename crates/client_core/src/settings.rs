use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("invalid backend url `{url}`: {reason}")]
    InvalidBackendUrl { url: String, reason: String },
    #[error("backend url must use ws:// or wss://, got `{0}`")]
    UnsupportedScheme(String),
    #[error("{field} must not be zero")]
    Zero { field: &'static str },
    #[error("{field} range is empty or inverted: [{min}, {max})")]
    InvalidRange {
        field: &'static str,
        min: f64,
        max: f64,
    },
    #[error("simulation gesture probability must be within [0, 1], got {0}")]
    InvalidProbability(f64),
}

/// Tunables for the realtime pipeline and the presentation schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub backend_url: String,
    pub media_path: String,
    pub reconnect_delay_ms: u64,
    pub poll_interval_ms: u64,
    pub pulse_duration_ms: u64,
    pub simulation_gesture_probability: f64,
    pub simulation_seed: Option<u64>,
    pub simulated_fps_min: f64,
    pub simulated_fps_max: f64,
    pub simulated_confidence_min: f64,
    pub simulated_confidence_max: f64,
    pub tracking_unit_count: usize,
    pub trigger_pause_ms: u64,
    pub awaken_pause_ms: u64,
    pub spawn_pause_ms: u64,
    pub tracking_pause_ms: u64,
    pub closing_pause_ms: u64,
    pub settle_pause_ms: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            backend_url: "ws://localhost:8000/ws".into(),
            media_path: "/video_feed".into(),
            reconnect_delay_ms: 3000,
            poll_interval_ms: 100,
            pulse_duration_ms: 600,
            simulation_gesture_probability: 0.06,
            simulation_seed: None,
            simulated_fps_min: 26.0,
            simulated_fps_max: 32.0,
            simulated_confidence_min: 0.90,
            simulated_confidence_max: 1.00,
            tracking_unit_count: 100,
            trigger_pause_ms: 500,
            awaken_pause_ms: 3000,
            spawn_pause_ms: 2000,
            tracking_pause_ms: 500,
            closing_pause_ms: 800,
            settle_pause_ms: 2000,
        }
    }
}

impl PipelineSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.backend_url()?;
        if self.poll_interval_ms == 0 {
            return Err(SettingsError::Zero {
                field: "poll_interval_ms",
            });
        }
        check_range(
            "simulated_fps",
            self.simulated_fps_min,
            self.simulated_fps_max,
        )?;
        if self.simulated_fps_min < 0.0 {
            return Err(SettingsError::InvalidRange {
                field: "simulated_fps",
                min: self.simulated_fps_min,
                max: self.simulated_fps_max,
            });
        }
        check_range(
            "simulated_confidence",
            self.simulated_confidence_min,
            self.simulated_confidence_max,
        )?;
        if self.simulated_confidence_min < 0.0 || self.simulated_confidence_max > 1.0 {
            return Err(SettingsError::InvalidRange {
                field: "simulated_confidence",
                min: self.simulated_confidence_min,
                max: self.simulated_confidence_max,
            });
        }
        if !(0.0..=1.0).contains(&self.simulation_gesture_probability) {
            return Err(SettingsError::InvalidProbability(
                self.simulation_gesture_probability,
            ));
        }
        Ok(())
    }

    pub fn backend_url(&self) -> Result<Url, SettingsError> {
        let url = Url::parse(self.backend_url.trim()).map_err(|err| {
            SettingsError::InvalidBackendUrl {
                url: self.backend_url.clone(),
                reason: err.to_string(),
            }
        })?;
        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(SettingsError::UnsupportedScheme(other.to_string())),
        }
    }

    /// Side-channel media resource served next to the realtime endpoint.
    pub fn media_url(&self) -> Result<Url, SettingsError> {
        let mut url = self.backend_url()?;
        let scheme = if url.scheme() == "wss" { "https" } else { "http" };
        url.set_scheme(scheme)
            .map_err(|_| SettingsError::UnsupportedScheme(url.scheme().to_string()))?;
        url.set_path(&self.media_path);
        url.set_query(None);
        Ok(url)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn pulse_duration(&self) -> Duration {
        Duration::from_millis(self.pulse_duration_ms)
    }
}

fn check_range(field: &'static str, min: f64, max: f64) -> Result<(), SettingsError> {
    if min.is_finite() && max.is_finite() && min < max {
        Ok(())
    } else {
        Err(SettingsError::InvalidRange { field, min, max })
    }
}
