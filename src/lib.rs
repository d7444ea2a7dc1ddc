//! scribed - Real-time speech-to-text streaming server
//!
//! Browser microphone audio in, JSON transcripts out. Two transports are
//! supported: a WebSocket carrying base64 chunks of the browser's encoded
//! stream, and a media-SDK room where the server subscribes to audio tracks
//! and publishes transcripts on a data channel.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod dispatch;
pub mod error;
pub mod filter;
pub mod models;
pub mod rtc;
pub mod server;
pub mod session;
pub mod sink;
pub mod stt;

// Core pipeline (buffer → gate → infer → filter → sink)
pub use dispatch::{AudioWindow, DispatchOutcome, DispatchRequest, Dispatcher};
pub use filter::HallucinationFilter;
pub use session::{ChunkBuffer, Session};
pub use sink::{ChannelSink, CollectorSink, Transcript, TranscriptSink};
pub use stt::{MockTranscriber, SharedEngine, Transcriber, TranscriptionResult};

// Error handling
pub use error::{Result, ScribedError};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.3.1+abc1234"` when git hash is available, `"0.3.1"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
