use std::{collections::HashMap, fs, time::Duration};

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    pub server_bind: String,
    pub stats_interval_ms: u64,
    pub frame_interval_ms: u64,
    pub gesture_probability: f64,
    pub confidence: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8000".into(),
            stats_interval_ms: 500,
            frame_interval_ms: 20,
            gesture_probability: 0.005,
            confidence: 0.9,
        }
    }
}

impl Settings {
    pub fn stats_interval(&self) -> Duration {
        Duration::from_millis(self.stats_interval_ms.max(1))
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }
}

pub fn load_settings() -> Settings {
    let file_cfg = fs::read_to_string("server.toml")
        .ok()
        .and_then(|raw| toml::from_str::<toml::Table>(&raw).ok())
        .map(flatten_table)
        .unwrap_or_default();
    let env: HashMap<String, String> = std::env::vars().collect();
    apply_overrides(Settings::default(), &file_cfg, &env)
}

fn flatten_table(table: toml::Table) -> HashMap<String, String> {
    table
        .into_iter()
        .map(|(key, value)| match value {
            toml::Value::String(text) => (key, text),
            other => (key, other.to_string()),
        })
        .collect()
}

fn apply_overrides(
    mut settings: Settings,
    file_cfg: &HashMap<String, String>,
    env: &HashMap<String, String>,
) -> Settings {
    if let Some(v) = file_cfg.get("bind_addr") {
        settings.server_bind = v.clone();
    }
    if let Some(v) = file_cfg.get("stats_interval_ms").and_then(|v| v.parse().ok()) {
        settings.stats_interval_ms = v;
    }
    if let Some(v) = file_cfg.get("frame_interval_ms").and_then(|v| v.parse().ok()) {
        settings.frame_interval_ms = v;
    }
    if let Some(v) = file_cfg.get("gesture_probability").and_then(|v| v.parse().ok()) {
        settings.gesture_probability = v;
    }
    if let Some(v) = file_cfg.get("confidence").and_then(|v| v.parse().ok()) {
        settings.confidence = v;
    }

    if let Some(v) = env.get("SERVER_BIND") {
        settings.server_bind = v.clone();
    }
    if let Some(v) = env.get("APP__BIND_ADDR") {
        settings.server_bind = v.clone();
    }
    if let Some(v) = env.get("APP__STATS_INTERVAL_MS").and_then(|v| v.parse().ok()) {
        settings.stats_interval_ms = v;
    }
    if let Some(v) = env.get("APP__FRAME_INTERVAL_MS").and_then(|v| v.parse().ok()) {
        settings.frame_interval_ms = v;
    }
    if let Some(v) = env
        .get("APP__GESTURE_PROBABILITY")
        .and_then(|v| v.parse::<f64>().ok())
    {
        settings.gesture_probability = v;
    }
    if let Some(v) = env.get("APP__CONFIDENCE").and_then(|v| v.parse::<f64>().ok()) {
        settings.confidence = v;
    }
    settings.gesture_probability = settings.gesture_probability.clamp(0.0, 1.0);
    if !settings.confidence.is_finite() {
        settings.confidence = Settings::default().confidence;
    }
    settings.confidence = settings.confidence.clamp(0.0, 1.0);

    settings
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
