//! Transcriber trait and test doubles.

use crate::error::{Result, ScribedError};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// One successful inference call's output.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionResult {
    pub text: String,
    /// Detected (or forced) language code.
    pub language: String,
    /// Mean per-segment confidence, 0.0 to 1.0.
    pub confidence: f32,
}

/// Trait for speech-to-text transcription.
///
/// This trait allows swapping implementations (real Whisper vs mock).
/// Implementations must be safe to call concurrently from blocking worker
/// threads; internal serialization (e.g. a context mutex) is the
/// implementation's responsibility.
pub trait Transcriber: Send + Sync {
    /// Transcribe audio samples to text.
    ///
    /// # Arguments
    /// * `audio` - Audio samples as 16-bit PCM at 16kHz mono
    /// * `language` - Language code, or "auto" for detection
    fn transcribe(&self, audio: &[i16], language: &str) -> Result<TranscriptionResult>;

    /// Get the name of the loaded model
    fn model_name(&self) -> &str;

    /// Check if the transcriber is ready
    fn is_ready(&self) -> bool;
}

/// Implement Transcriber for Arc<T> to allow sharing across sessions.
impl<T: Transcriber + ?Sized> Transcriber for Arc<T> {
    fn transcribe(&self, audio: &[i16], language: &str) -> Result<TranscriptionResult> {
        (**self).transcribe(audio, language)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }
}

/// Mock transcriber for testing.
///
/// Records call count and the last requested language so tests can assert
/// on dispatch behavior; an optional synthetic latency simulates a slow
/// model for backpressure tests.
#[derive(Debug, Clone)]
pub struct MockTranscriber {
    model_name: String,
    response: String,
    should_fail: bool,
    latency: Option<Duration>,
    calls: Arc<AtomicUsize>,
    last_language: Arc<std::sync::Mutex<Option<String>>>,
}

impl MockTranscriber {
    /// Create a new mock transcriber with default settings
    pub fn new(model_name: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            response: "mock transcription".to_string(),
            should_fail: false,
            latency: None,
            calls: Arc::new(AtomicUsize::new(0)),
            last_language: Arc::new(std::sync::Mutex::new(None)),
        }
    }

    /// Configure the mock to return a specific response
    pub fn with_response(mut self, response: &str) -> Self {
        self.response = response.to_string();
        self
    }

    /// Configure the mock to fail on transcribe
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Configure the mock to sleep before responding (simulates inference time)
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of transcribe calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Language requested on the most recent call.
    pub fn last_language(&self) -> Option<String> {
        self.last_language
            .lock()
            .map(|g| g.clone())
            .unwrap_or(None)
    }
}

impl Transcriber for MockTranscriber {
    fn transcribe(&self, _audio: &[i16], language: &str) -> Result<TranscriptionResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut guard) = self.last_language.lock() {
            *guard = Some(language.to_string());
        }
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
        if self.should_fail {
            Err(ScribedError::Transcription {
                message: "mock transcription failure".to_string(),
            })
        } else {
            Ok(TranscriptionResult {
                text: self.response.clone(),
                language: language.to_string(),
                confidence: 0.9,
            })
        }
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn is_ready(&self) -> bool {
        !self.should_fail
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_transcriber_returns_response() {
        let transcriber = MockTranscriber::new("test-model").with_response("Hello, this is a test");

        let audio = vec![0i16; 1000];
        let result = transcriber.transcribe(&audio, "en");

        assert!(result.is_ok());
        let result = result.unwrap();
        assert_eq!(result.text, "Hello, this is a test");
        assert_eq!(result.language, "en");
    }

    #[test]
    fn test_mock_transcriber_returns_error_when_configured() {
        let transcriber = MockTranscriber::new("test-model").with_failure();

        let audio = vec![0i16; 1000];
        let result = transcriber.transcribe(&audio, "en");

        assert!(result.is_err());
        match result {
            Err(ScribedError::Transcription { message }) => {
                assert_eq!(message, "mock transcription failure");
            }
            _ => panic!("Expected Transcription error"),
        }
    }

    #[test]
    fn test_mock_transcriber_counts_calls() {
        let transcriber = MockTranscriber::new("test-model");
        assert_eq!(transcriber.call_count(), 0);

        let audio = vec![0i16; 10];
        let _ = transcriber.transcribe(&audio, "en");
        let _ = transcriber.transcribe(&audio, "de");

        assert_eq!(transcriber.call_count(), 2);
        assert_eq!(transcriber.last_language(), Some("de".to_string()));
    }

    #[test]
    fn test_mock_transcriber_clones_share_counters() {
        let transcriber = MockTranscriber::new("test-model");
        let clone = transcriber.clone();

        let audio = vec![0i16; 10];
        let _ = clone.transcribe(&audio, "en");

        assert_eq!(transcriber.call_count(), 1);
    }

    #[test]
    fn test_mock_transcriber_latency() {
        let transcriber =
            MockTranscriber::new("test-model").with_latency(Duration::from_millis(20));

        let start = std::time::Instant::now();
        let _ = transcriber.transcribe(&[0i16; 10], "en");
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_mock_transcriber_is_ready() {
        let ready_transcriber = MockTranscriber::new("test-model");
        assert!(ready_transcriber.is_ready());

        let failing_transcriber = MockTranscriber::new("test-model").with_failure();
        assert!(!failing_transcriber.is_ready());
    }

    #[test]
    fn test_transcriber_trait_is_object_safe() {
        let transcriber: Box<dyn Transcriber> =
            Box::new(MockTranscriber::new("test-model").with_response("boxed test"));

        assert_eq!(transcriber.model_name(), "test-model");
        assert!(transcriber.is_ready());

        let audio = vec![0i16; 100];
        let result = transcriber.transcribe(&audio, "en");
        assert_eq!(result.unwrap().text, "boxed test");
    }

    #[test]
    fn test_arc_transcriber_delegates() {
        let transcriber: Arc<dyn Transcriber> = Arc::new(MockTranscriber::new("arc-model"));
        assert_eq!(transcriber.model_name(), "arc-model");
        assert!(transcriber.transcribe(&[0i16; 10], "auto").is_ok());
    }
}
