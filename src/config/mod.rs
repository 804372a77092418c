//! Runtime settings (layered: explicit > config file > env > defaults).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{Result, SwitchyardError};

/// Deployment posture. Production hardens connection handling (bounded
/// reconnection, signed hosted tokens); development keeps both best-effort.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Posture {
    Production,
    #[default]
    Development,
}

/// Idle-session cache knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Seconds a session may sit idle before the sweep evicts it.
    pub idle_ttl_secs: u64,
    /// Interval between eviction sweeps.
    pub sweep_interval_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            idle_ttl_secs: 30 * 60,
            sweep_interval_secs: 60,
        }
    }
}

impl SessionSettings {
    pub fn idle_ttl(&self) -> Duration {
        Duration::from_secs(self.idle_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Bounded-reconnection policy for streaming HTTP transports.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectSettings {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 10_000,
            multiplier: 2.0,
        }
    }
}

/// Hosted-transport token signing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostedSettings {
    /// HMAC-SHA256 signing key shared with the remote tool endpoint.
    pub signing_key: String,
    /// Lifetime of issued bearer tokens.
    pub token_ttl_secs: u64,
}

impl Default for HostedSettings {
    fn default() -> Self {
        Self {
            signing_key: String::new(),
            token_ttl_secs: 3600,
        }
    }
}

/// Top-level runtime settings for the orchestration layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    pub posture: Posture,
    pub session: SessionSettings,
    pub reconnect: ReconnectSettings,
    pub hosted: HostedSettings,
}

impl RuntimeSettings {
    /// Parse settings from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&raw).map_err(|e| {
            SwitchyardError::Configuration(format!(
                "invalid settings file {}: {e}",
                path.as_ref().display()
            ))
        })
    }

    /// Load settings from the default config file (if present) with
    /// environment overrides applied on top.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error

        let mut settings = match Self::default_config_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        settings.apply_env();
        Ok(settings)
    }

    /// Apply `SWITCHYARD_*` environment overrides in place.
    pub fn apply_env(&mut self) {
        if let Ok(value) = std::env::var("SWITCHYARD_POSTURE") {
            match value.parse() {
                Ok(posture) => self.posture = posture,
                Err(_) => tracing::warn!(value = %value, "Ignoring unknown SWITCHYARD_POSTURE"),
            }
        }
        if let Some(secs) = env_u64("SWITCHYARD_SESSION_TTL_SECS") {
            self.session.idle_ttl_secs = secs;
        }
        if let Some(secs) = env_u64("SWITCHYARD_SWEEP_INTERVAL_SECS") {
            self.session.sweep_interval_secs = secs;
        }
        if let Some(attempts) = env_u64("SWITCHYARD_RECONNECT_MAX_ATTEMPTS") {
            self.reconnect.max_attempts = attempts as u32;
        }
        if let Ok(key) = std::env::var("SWITCHYARD_HOSTED_SIGNING_KEY") {
            self.hosted.signing_key = key;
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "switchyard")
            .map(|dirs| dirs.config_dir().join("settings.toml"))
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
