use std::{collections::HashMap, fs, path::Path};

use anyhow::{Context, Result};
use client_core::PipelineSettings;

pub const DEFAULT_CONFIG_FILE: &str = "eye.toml";

/// Reads `path` when given, otherwise `eye.toml` if it exists, then layers
/// environment overrides on top.
pub fn load_settings(path: Option<&Path>) -> Result<PipelineSettings> {
    let base = match path {
        Some(path) => read_file(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            read_file(Path::new(DEFAULT_CONFIG_FILE))?
        }
        None => PipelineSettings::default(),
    };
    let env: HashMap<String, String> = std::env::vars().collect();
    Ok(apply_env(base, &env))
}

fn read_file(path: &Path) -> Result<PipelineSettings> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_settings(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

fn parse_settings(raw: &str) -> Result<PipelineSettings> {
    Ok(toml::from_str(raw)?)
}

fn apply_env(mut settings: PipelineSettings, env: &HashMap<String, String>) -> PipelineSettings {
    if let Some(v) = env.get("EYE_BACKEND_URL") {
        settings.backend_url = v.clone();
    }
    if let Some(v) = env.get("APP__BACKEND_URL") {
        settings.backend_url = v.clone();
    }
    if let Some(v) = env.get("APP__MEDIA_PATH") {
        settings.media_path = v.clone();
    }
    if let Some(v) = env.get("APP__RECONNECT_DELAY_MS").and_then(|v| v.parse().ok()) {
        settings.reconnect_delay_ms = v;
    }
    if let Some(v) = env.get("APP__POLL_INTERVAL_MS").and_then(|v| v.parse().ok()) {
        settings.poll_interval_ms = v;
    }
    if let Some(v) = env
        .get("APP__SIMULATION_GESTURE_PROBABILITY")
        .and_then(|v| v.parse().ok())
    {
        settings.simulation_gesture_probability = v;
    }
    if let Some(v) = env.get("APP__SIMULATION_SEED").and_then(|v| v.parse().ok()) {
        settings.simulation_seed = Some(v);
    }
    settings
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
