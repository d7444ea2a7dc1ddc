//! Speech-to-text engine and the shared engine slot.

pub mod transcriber;
pub mod whisper;

pub use transcriber::{MockTranscriber, Transcriber, TranscriptionResult};
pub use whisper::{WhisperConfig, WhisperTranscriber};

use std::sync::{Arc, RwLock};

/// Shared slot for the transcription engine.
///
/// The model loads in the background at startup; until it lands, every
/// consumer sees "not ready" and must degrade instead of blocking. Cloning
/// is cheap and every clone observes the same slot.
#[derive(Clone)]
pub struct SharedEngine {
    inner: Arc<RwLock<Option<Arc<dyn Transcriber>>>>,
}

impl SharedEngine {
    /// Create an empty slot (model not loaded yet).
    pub fn empty() -> Self {
        Self {
            inner: Arc::new(RwLock::new(None)),
        }
    }

    /// Create a slot that already holds a transcriber.
    pub fn preloaded(transcriber: Arc<dyn Transcriber>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(transcriber))),
        }
    }

    /// Install a transcriber, making the engine ready.
    pub fn install(&self, transcriber: Arc<dyn Transcriber>) {
        let mut slot = match self.inner.write() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Some(transcriber);
    }

    /// Get the current transcriber, if one is installed and ready.
    pub fn get(&self) -> Option<Arc<dyn Transcriber>> {
        let slot = match self.inner.read() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        slot.as_ref().filter(|t| t.is_ready()).cloned()
    }

    /// Whether a ready transcriber is installed.
    pub fn is_ready(&self) -> bool {
        self.get().is_some()
    }

    /// Name of the loaded model, if any.
    pub fn model_name(&self) -> Option<String> {
        self.get().map(|t| t.model_name().to_string())
    }
}

impl std::fmt::Debug for SharedEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedEngine")
            .field("ready", &self.is_ready())
            .finish()
    }
}
