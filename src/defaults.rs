//! Default configuration constants for scribed.
//!
//! This module provides shared constants used across different configuration types
//! to ensure consistency and eliminate duplication.

/// Audio sample rate expected by the transcription model, in Hz.
///
/// 16kHz is the standard for speech recognition and provides a good balance
/// between quality and computational efficiency for voice applications.
pub const SAMPLE_RATE: u32 = 16000;

/// Bytes per PCM sample (16-bit signed integers).
pub const BYTES_PER_SAMPLE: usize = 2;

/// Byte ceiling for a session's encoded chunk buffer.
///
/// Browser encoders emit roughly 32 KB/s, so 160 KB keeps about the last
/// five seconds of compressed audio. Bounding the buffer bounds both memory
/// and the cost of re-demuxing the container on every inference attempt.
pub const BUFFER_CAP_BYTES: usize = 160 * 1024;

/// Bytes pinned at the front of a session buffer when truncating.
///
/// Containerized streams (WebM/Ogg) put the codec initialization data in the
/// first bytes of the stream; a demuxer cannot parse a tail slice that lost
/// them. Truncation drops from just after this prefix, never before it.
pub const HEADER_RESERVE_BYTES: usize = 4096;

/// Trailing window of decoded audio handed to the model, in milliseconds.
///
/// The session buffer may decode to more audio than we want to re-transcribe;
/// only the most recent slice is relevant for incremental results.
pub const TAIL_WINDOW_MS: u32 = 5000;

/// PCM window size for media-SDK tracks, in milliseconds.
///
/// 600ms keeps turnaround near-realtime while giving the model enough
/// context to produce usable text.
pub const TRACK_WINDOW_MS: u32 = 600;

/// Bounded inference timeout in milliseconds.
///
/// A window whose inference exceeds this is discarded, not retried; the next
/// window simply supersedes it. This caps worst-case transcript staleness.
pub const INFERENCE_TIMEOUT_MS: u64 = 2000;

/// Loudness gate for decoded chunk audio, in dBFS.
///
/// Windows quieter than this are treated as silence and never reach the
/// model. -50 dBFS is well below speech at typical browser mic levels.
pub const SILENCE_GATE_DBFS: f32 = -50.0;

/// Peak-amplitude gate for raw PCM track audio (normalized 0.0 to 1.0).
///
/// Cheaper than an RMS measure; SDK tracks deliver decoded PCM where a peak
/// check is enough to skip silent windows.
pub const PEAK_GATE: f32 = 0.005;

/// Default Whisper model name.
///
/// "base" (multilingual) supports auto-detection of any language.
/// Use "base.en" explicitly for English-only optimized transcription.
pub const DEFAULT_MODEL: &str = "base";

/// Language value that triggers automatic language detection.
pub const AUTO_LANGUAGE: &str = "auto";

/// Language assumed for a chunk that does not carry one.
pub const CHUNK_LANGUAGE: &str = "en";

/// Default server bind host.
pub const SERVER_HOST: &str = "0.0.0.0";

/// Default server port.
pub const SERVER_PORT: u16 = 8000;

/// Default lifetime of an issued media-SDK access token, in seconds.
pub const TOKEN_TTL_SECS: u64 = 3600;

/// Data-channel topic transcripts are published on.
pub const TRANSCRIPTION_TOPIC: &str = "transcription";

/// Data-channel topic carrying per-participant configuration messages.
pub const CONFIG_TOPIC: &str = "config";

/// Report the GPU backend compiled into this build.
///
/// Returns a human-readable name based on the compile-time feature flags.
/// Only one GPU backend can be active at a time; if none is enabled, returns "CPU".
pub fn gpu_backend() -> &'static str {
    if cfg!(feature = "cuda") {
        "CUDA"
    } else if cfg!(feature = "vulkan") {
        "Vulkan"
    } else if cfg!(feature = "hipblas") {
        "HipBLAS"
    } else if cfg!(feature = "openblas") {
        "OpenBLAS"
    } else {
        "CPU"
    }
}
