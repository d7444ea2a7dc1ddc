//! Transcript delivery.
//!
//! Dispatch tasks finish on their own schedule, long after the request that
//! triggered them returned. A sink carries the finished transcript back to
//! whatever transport owns the client: a WebSocket writer loop, a data
//! channel publisher, or a test collector.

use crate::error::{Result, ScribedError};
use async_trait::async_trait;

/// A finished transcript ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub text: String,
    pub language: String,
    pub confidence: f32,
    /// Client-supplied timestamp from the triggering chunk, milliseconds.
    pub timestamp_ms: u64,
    /// Wall time from dispatch to finished inference, milliseconds.
    pub turnaround_ms: u64,
    /// Set on the media-room path; WebSocket sessions have no participant.
    pub participant: Option<String>,
}

/// Destination for finished transcripts.
///
/// Delivery is best-effort: a sink whose receiver has gone away returns an
/// error, and the dispatcher logs and drops the transcript. A closed client
/// must never take the inference pipeline down with it.
#[async_trait]
pub trait TranscriptSink: Send + Sync {
    async fn publish(&self, transcript: Transcript) -> Result<()>;
}

/// Sink backed by a tokio mpsc channel, used by the WebSocket writer loop.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: tokio::sync::mpsc::Sender<Transcript>,
}

impl ChannelSink {
    pub fn new(tx: tokio::sync::mpsc::Sender<Transcript>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl TranscriptSink for ChannelSink {
    async fn publish(&self, transcript: Transcript) -> Result<()> {
        self.tx
            .send(transcript)
            .await
            .map_err(|_| ScribedError::Transport {
                message: "transcript receiver dropped".to_string(),
            })
    }
}

/// Sink that records everything it receives. Test-only in spirit, but kept
/// in the library so integration tests across crates can use it.
#[derive(Debug, Clone, Default)]
pub struct CollectorSink {
    received: std::sync::Arc<std::sync::Mutex<Vec<Transcript>>>,
}

impl CollectorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transcripts(&self) -> Vec<Transcript> {
        self.received
            .lock()
            .map(|g| g.clone())
            .unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.received.lock().map(|g| g.len()).unwrap_or(0)
    }
}

#[async_trait]
impl TranscriptSink for CollectorSink {
    async fn publish(&self, transcript: Transcript) -> Result<()> {
        if let Ok(mut guard) = self.received.lock() {
            guard.push(transcript);
        }
        Ok(())
    }
}
