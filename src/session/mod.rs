//! Per-connection session state.

pub mod buffer;

pub use buffer::ChunkBuffer;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::task::JoinHandle;

/// State for one streaming connection (WebSocket client or media track).
///
/// The `inflight` flag enforces the core dispatch rule: at most one
/// inference runs per session, and a busy session skips new windows instead
/// of queueing them. Queued windows would each take a full inference slot
/// and latency compounds until transcripts arrive a minute late.
pub struct Session {
    id: String,
    pub buffer: ChunkBuffer,
    pub language: String,
    created: Instant,
    inflight: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl Session {
    pub fn new(max_bytes: usize, header_reserve: usize, language: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            buffer: ChunkBuffer::new(max_bytes, header_reserve),
            language: language.to_string(),
            created: Instant::now(),
            inflight: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn age(&self) -> std::time::Duration {
        self.created.elapsed()
    }

    /// Shared handle to the in-flight flag, for the dispatch guard.
    pub fn inflight_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.inflight)
    }

    /// Whether an inference is currently running for this session.
    pub fn is_busy(&self) -> bool {
        self.inflight.load(Ordering::SeqCst)
    }

    /// Remember the spawned inference task so teardown can cancel it.
    pub fn set_task(&mut self, task: JoinHandle<()>) {
        self.task = Some(task);
    }

    /// Cancel any in-flight inference. Called when the connection closes;
    /// the result would have nowhere to go.
    pub fn teardown(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.inflight.store(false, Ordering::SeqCst);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("language", &self.language)
            .field("buffer_len", &self.buffer.len())
            .field("busy", &self.is_busy())
            .finish()
    }
}
