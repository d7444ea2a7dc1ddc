//! TOML configuration for the scribed server.
//!
//! Missing fields fall back to defaults; a missing file falls back to the
//! full default configuration. Media-SDK credentials are additionally read
//! from the environment (`LIVEKIT_URL`, `LIVEKIT_API_KEY`,
//! `LIVEKIT_API_SECRET`) so secrets can stay out of the file.

use crate::defaults;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub stt: SttConfig,
    pub buffer: BufferConfig,
    pub dispatch: DispatchConfig,
    pub filter: FilterConfig,
    pub rtc: RtcConfig,
}

/// HTTP/WebSocket server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Speech-to-text configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SttConfig {
    /// Model name from the catalog (e.g. "base", "small.en").
    pub model: String,
    /// Explicit model file path, overriding the catalog lookup.
    pub model_path: Option<PathBuf>,
    /// Default language when a session does not select one.
    pub language: String,
    /// Inference threads (None = auto-detect).
    pub threads: Option<usize>,
}

/// Session buffer configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BufferConfig {
    /// Byte ceiling for buffered encoded audio beyond the pinned header.
    pub max_bytes: usize,
    /// Bytes pinned at the front of the stream so the container header
    /// survives truncation. Set to 0 for a pure trailing-slice buffer.
    pub header_reserve: usize,
}

/// Inference dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DispatchConfig {
    /// Bounded inference timeout in milliseconds.
    pub inference_timeout_ms: u64,
    /// Loudness gate for decoded chunk audio, in dBFS.
    pub silence_gate_dbfs: f32,
    /// Peak gate for raw PCM track audio (normalized).
    pub peak_gate: f32,
    /// Trailing window of decoded audio sent to the model, in milliseconds.
    pub tail_window_ms: u32,
    /// PCM window size for media-SDK tracks, in milliseconds.
    pub track_window_ms: u32,
}

/// Hallucination filter configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct FilterConfig {
    /// Phrases rejected in addition to the built-in blocklist, matched
    /// exactly against trimmed transcript text.
    pub extra_phrases: Vec<String>,
}

/// Media SDK (LiveKit-compatible) configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct RtcConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    /// Lifetime of issued access tokens, in seconds.
    pub token_ttl_secs: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: defaults::SERVER_HOST.to_string(),
            port: defaults::SERVER_PORT,
        }
    }
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: defaults::DEFAULT_MODEL.to_string(),
            model_path: None,
            language: defaults::AUTO_LANGUAGE.to_string(),
            threads: None,
        }
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            max_bytes: defaults::BUFFER_CAP_BYTES,
            header_reserve: defaults::HEADER_RESERVE_BYTES,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            inference_timeout_ms: defaults::INFERENCE_TIMEOUT_MS,
            silence_gate_dbfs: defaults::SILENCE_GATE_DBFS,
            peak_gate: defaults::PEAK_GATE,
            tail_window_ms: defaults::TAIL_WINDOW_MS,
            track_window_ms: defaults::TRACK_WINDOW_MS,
        }
    }
}

impl RtcConfig {
    /// True when every credential needed to mint tokens is present.
    pub fn is_configured(&self) -> bool {
        self.url.is_some() && self.api_key.is_some() && self.api_secret.is_some()
    }

    /// Fill unset credentials from the environment.
    pub fn apply_env(&mut self) {
        if self.url.is_none() {
            self.url = std::env::var("LIVEKIT_URL").ok().filter(|s| !s.is_empty());
        }
        if self.api_key.is_none() {
            self.api_key = std::env::var("LIVEKIT_API_KEY")
                .ok()
                .filter(|s| !s.is_empty());
        }
        if self.api_secret.is_none() {
            self.api_secret = std::env::var("LIVEKIT_API_SECRET")
                .ok()
                .filter(|s| !s.is_empty());
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file doesn't exist.
    ///
    /// Only returns defaults if the file is missing; invalid TOML is still
    /// an error worth surfacing, not silently ignoring.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e) => {
                if e.downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false)
                {
                    Ok(Self::default())
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Default configuration file path (`~/.config/scribed/scribed.toml`).
    #[cfg(feature = "cli")]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("scribed")
            .join("scribed.toml")
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.dispatch.inference_timeout_ms == 0 {
            return Err(crate::error::ScribedError::ConfigInvalidValue {
                key: "dispatch.inference_timeout_ms".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.dispatch.track_window_ms == 0 {
            return Err(crate::error::ScribedError::ConfigInvalidValue {
                key: "dispatch.track_window_ms".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.buffer.max_bytes == 0 {
            return Err(crate::error::ScribedError::ConfigInvalidValue {
                key: "buffer.max_bytes".to_string(),
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}
