use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::RelayError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service region forwarded in the session-initiation message and
    /// used to derive endpoint URLs when no override is set.
    #[serde(default = "default_region")]
    pub region: String,
    /// Language code sent to the service (e.g. "en-US").
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_sample_rate_hz")]
    pub sample_rate_hz: u32,
    #[serde(default = "default_channels")]
    pub channels: u16,
    /// Size of one relay frame in bytes (s16le, so two bytes per sample).
    #[serde(default = "default_frame_size_bytes")]
    pub frame_size_bytes: usize,
    /// Explicit streaming endpoint URL (wss://...). Required for
    /// streaming mode; there is no vendor-specific default.
    #[serde(default)]
    pub streaming_endpoint: Option<String>,
    /// Explicit batch endpoint base URL (https://...). Required for
    /// batch mode.
    #[serde(default)]
    pub batch_endpoint: Option<String>,
    /// Environment variable holding the credential context to forward.
    /// The relay carries no credential logic of its own.
    #[serde(default = "default_auth_token_env")]
    pub auth_token_env: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_language() -> String {
    "en-US".to_string()
}

fn default_sample_rate_hz() -> u32 {
    16000
}

fn default_channels() -> u16 {
    1
}

fn default_frame_size_bytes() -> usize {
    2048 // 1024 s16le samples, 64ms at 16kHz
}

fn default_auth_token_env() -> String {
    "TRANSCRIBE_AUTH_TOKEN".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_drain_timeout_secs() -> u64 {
    10
}

fn default_poll_interval_secs() -> u64 {
    5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            region: default_region(),
            language: default_language(),
            sample_rate_hz: default_sample_rate_hz(),
            channels: default_channels(),
            frame_size_bytes: default_frame_size_bytes(),
            streaming_endpoint: None,
            batch_endpoint: None,
            auth_token_env: default_auth_token_env(),
            connect_timeout_secs: default_connect_timeout_secs(),
            drain_timeout_secs: default_drain_timeout_secs(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl Config {
    /// Validates config values after loading. Clamps out-of-range values
    /// and falls back to defaults for clearly invalid inputs.
    pub fn validate(&mut self) -> Result<()> {
        if self.region.trim().is_empty() {
            self.region = default_region();
        }
        if self.language.trim().is_empty() {
            self.language = default_language();
        }

        // Clamp numeric fields to sane ranges
        self.sample_rate_hz = self.sample_rate_hz.clamp(8000, 48000);
        self.channels = self.channels.clamp(1, 2);
        self.frame_size_bytes = self.frame_size_bytes.clamp(320, 65536);
        // s16le frames must hold a whole number of samples
        if self.frame_size_bytes % 2 != 0 {
            self.frame_size_bytes += 1;
        }
        self.connect_timeout_secs = self.connect_timeout_secs.clamp(1, 300);
        self.drain_timeout_secs = self.drain_timeout_secs.clamp(1, 300);
        self.poll_interval_secs = self.poll_interval_secs.clamp(1, 60);

        Ok(())
    }

    /// Streaming endpoint URL, or a config error naming the missing key.
    pub fn streaming_url(&self) -> Result<String, RelayError> {
        self.streaming_endpoint.clone().ok_or_else(|| {
            RelayError::Config(format!(
                "streaming_endpoint is not set for region {}; add it to {}",
                self.region,
                config_path().display()
            ))
        })
    }

    /// Batch endpoint base URL, or a config error naming the missing key.
    pub fn batch_url(&self) -> Result<String, RelayError> {
        self.batch_endpoint.clone().ok_or_else(|| {
            RelayError::Config(format!(
                "batch_endpoint is not set for region {}; add it to {}",
                self.region,
                config_path().display()
            ))
        })
    }

    /// Credential context from the configured environment variable.
    /// Resolution is delegated entirely to the environment; a missing
    /// token means an anonymous connection attempt.
    pub fn resolve_auth_token(&self) -> Option<String> {
        std::env::var(&self.auth_token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
    }

    /// Samples per frame at the configured frame size.
    pub fn samples_per_frame(&self) -> usize {
        self.frame_size_bytes / 2
    }
}

pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("transcribe-relay")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

pub fn load_config() -> Result<Config> {
    load_config_from(&config_path())
}

pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;

    let mut config: Config = toml::from_str(&content).context("Failed to parse config")?;
    config.validate()?;
    Ok(config)
}

/// Set restrictive file permissions (owner-only read/write) on Unix systems.
#[cfg(unix)]
pub fn set_owner_only_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .with_context(|| format!("Failed to set permissions: {}", path.display()))
}

#[cfg(not(unix))]
pub fn set_owner_only_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

pub fn save_config(config: &Config) -> Result<()> {
    let dir = config_dir();
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    let path = config_path();
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;

    fs::write(&path, &content)
        .with_context(|| format!("Failed to write config: {}", path.display()))?;

    set_owner_only_permissions(&path)?;

    Ok(())
}
