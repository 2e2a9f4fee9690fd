use std::{fs, path::Path, time::Duration};

use anyhow::{anyhow, Context, Result};
use client_core::{promotion::PromotionMode, ControllerSettings};
use serde::Deserialize;
use shared::domain::{Side, SideCaseMapping};

pub const DEFAULT_CONFIG_FILE: &str = "board-client.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub database_url: String,
    pub poll_interval_ms: u64,
    pub promotion_mode: PromotionMode,
    pub uppercase_side: Side,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:5000".into(),
            database_url: "sqlite://./data/client.db".into(),
            poll_interval_ms: 2_000,
            promotion_mode: PromotionMode::Atomic,
            uppercase_side: Side::Black,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    server_url: Option<String>,
    database_url: Option<String>,
    poll_interval_ms: Option<u64>,
    promotion_mode: Option<PromotionMode>,
    uppercase_side: Option<Side>,
}

impl Settings {
    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            promotion_mode: self.promotion_mode,
            mapping: SideCaseMapping {
                uppercase: self.uppercase_side,
            },
        }
    }
}

/// Defaults, then the TOML file (if present), then `APP__*` environment variables.
pub fn load_settings(config_path: &Path) -> Result<Settings> {
    let mut settings = Settings::default();

    match fs::read_to_string(config_path) {
        Ok(raw) => apply_file(&mut settings, &raw)
            .with_context(|| format!("invalid config file '{}'", config_path.display()))?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read config file '{}'", config_path.display()))
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok())?;
    validate(&settings)?;
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw)?;
    if let Some(v) = file_cfg.server_url {
        settings.server_url = v;
    }
    if let Some(v) = file_cfg.database_url {
        settings.database_url = v;
    }
    if let Some(v) = file_cfg.poll_interval_ms {
        settings.poll_interval_ms = v;
    }
    if let Some(v) = file_cfg.promotion_mode {
        settings.promotion_mode = v;
    }
    if let Some(v) = file_cfg.uppercase_side {
        settings.uppercase_side = v;
    }
    Ok(())
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) -> Result<()> {
    if let Some(v) = var("APP__SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = var("APP__DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = var("APP__POLL_INTERVAL_MS") {
        settings.poll_interval_ms = v
            .parse()
            .with_context(|| format!("APP__POLL_INTERVAL_MS must be an integer, got '{v}'"))?;
    }
    if let Some(v) = var("APP__PROMOTION_MODE") {
        settings.promotion_mode = v.parse().map_err(|err: String| anyhow!(err))?;
    }
    if let Some(v) = var("APP__UPPERCASE_SIDE") {
        settings.uppercase_side = parse_side(&v)?;
    }
    Ok(())
}

pub fn parse_side(raw: &str) -> Result<Side> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "white" => Ok(Side::White),
        "black" => Ok(Side::Black),
        other => Err(anyhow!("side must be 'white' or 'black', got '{other}'")),
    }
}

pub fn validate(settings: &Settings) -> Result<()> {
    if settings.poll_interval_ms == 0 {
        return Err(anyhow!("poll_interval_ms must be greater than zero"));
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
