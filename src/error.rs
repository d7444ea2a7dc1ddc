//! Error types for scribed.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScribedError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio errors
    #[error("Audio decode failed: {message}")]
    AudioDecode { message: String },

    #[error("Audio format mismatch: expected {expected}, got {actual}")]
    AudioFormatMismatch { expected: String, actual: String },

    // Transcription errors
    #[error("Transcription model not found at {path}")]
    TranscriptionModelNotFound { path: String },

    #[error("Transcription inference failed: {message}")]
    TranscriptionInferenceFailed { message: String },

    #[error("Transcription engine not ready")]
    EngineNotReady,

    #[error("Transcription error: {message}")]
    Transcription { message: String },

    // Transport errors
    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Session error: {message}")]
    Session { message: String },

    // Media SDK errors
    #[error("Media SDK not configured: {message}")]
    RtcUnavailable { message: String },

    #[error("Access token error: {message}")]
    Token { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, ScribedError>;
