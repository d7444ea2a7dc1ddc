//! Inference dispatch.
//!
//! Both transports converge here: a snapshot of session audio comes in, and
//! if the session has no inference in flight, a background task conditions
//! the audio, gates silence, runs the model under a timeout, filters
//! hallucinations, and hands the transcript to the session's sink.
//!
//! The one rule that keeps latency bounded: a busy session SKIPS new
//! windows. Queueing them instead lets a slow model fall a full window
//! further behind on every tick until transcripts arrive a minute stale.

use crate::audio::{decode, level, resample};
use crate::config::DispatchConfig;
use crate::error::Result;
use crate::filter::HallucinationFilter;
use crate::sink::{Transcript, TranscriptSink};
use crate::stt::{SharedEngine, Transcriber};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// One window of session audio, as the transport delivered it.
#[derive(Debug, Clone)]
pub enum AudioWindow {
    /// Snapshot of a containerized browser stream (WebM/Ogg/WAV bytes).
    Encoded(Vec<u8>),
    /// Raw PCM from a media-SDK track.
    Pcm { samples: Vec<i16>, sample_rate: u32 },
}

/// What `try_dispatch` did with the window.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Inference task spawned; the handle allows teardown to cancel it.
    Started(JoinHandle<()>),
    /// An inference is already in flight for this session; window skipped.
    Busy,
    /// The engine has no model loaded yet; window skipped.
    NotReady,
}

/// Clears the session's in-flight flag when the inference task ends, whether
/// it finished, errored, or was aborted.
struct InflightGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Everything needed to identify and route one dispatched window.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub window: AudioWindow,
    pub language: String,
    /// Client-supplied timestamp carried through to the transcript.
    pub timestamp_ms: u64,
    /// Set on the media-room path.
    pub participant: Option<String>,
}

/// Shared inference dispatcher.
#[derive(Clone)]
pub struct Dispatcher {
    engine: SharedEngine,
    filter: Arc<HallucinationFilter>,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(engine: SharedEngine, filter: Arc<HallucinationFilter>, config: DispatchConfig) -> Self {
        Self {
            engine,
            filter,
            config,
        }
    }

    pub fn engine(&self) -> &SharedEngine {
        &self.engine
    }

    /// Try to dispatch one window for the session owning `inflight`.
    ///
    /// Returns immediately in every case. On `Started`, a background task
    /// owns the window from here; failures inside it (decode errors, gated
    /// silence, timeout, filtered text) are logged and swallowed, because
    /// the stream continues regardless.
    pub fn try_dispatch(
        &self,
        inflight: Arc<AtomicBool>,
        request: DispatchRequest,
        sink: Arc<dyn TranscriptSink>,
    ) -> DispatchOutcome {
        let Some(transcriber) = self.engine.get() else {
            return DispatchOutcome::NotReady;
        };

        if inflight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(participant = ?request.participant, "inference in flight, skipping window");
            return DispatchOutcome::Busy;
        }

        let guard = InflightGuard {
            flag: Arc::clone(&inflight),
        };
        let filter = Arc::clone(&self.filter);
        let config = self.config.clone();

        let task = tokio::spawn(async move {
            // Tie the flag to the task lifetime, including abort
            let _guard = guard;
            run_inference(transcriber, filter, config, request, sink).await;
        });

        DispatchOutcome::Started(task)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("engine", &self.engine)
            .field("config", &self.config)
            .finish()
    }
}

async fn run_inference(
    transcriber: Arc<dyn Transcriber>,
    filter: Arc<HallucinationFilter>,
    config: DispatchConfig,
    request: DispatchRequest,
    sink: Arc<dyn TranscriptSink>,
) {
    let started = Instant::now();
    let DispatchRequest {
        window,
        language,
        timestamp_ms,
        participant,
    } = request;

    // Decode and gate on a blocking thread; demuxing a container is not a
    // few-microsecond job
    let prep_config = config.clone();
    let prepared = tokio::task::spawn_blocking(move || prepare_window(window, &prep_config)).await;

    let samples = match prepared {
        Ok(Ok(Some(samples))) => samples,
        Ok(Ok(None)) => {
            debug!(participant = ?participant, "window gated as silence");
            return;
        }
        Ok(Err(e)) => {
            warn!(error = %e, "window preparation failed");
            return;
        }
        Err(e) => {
            warn!(error = %e, "preparation task panicked");
            return;
        }
    };

    let timeout = Duration::from_millis(config.inference_timeout_ms);
    let infer_language = language.clone();
    let inference = tokio::time::timeout(
        timeout,
        tokio::task::spawn_blocking(move || transcriber.transcribe(&samples, &infer_language)),
    )
    .await;

    let result = match inference {
        Ok(Ok(Ok(result))) => result,
        Ok(Ok(Err(e))) => {
            warn!(error = %e, "inference failed");
            return;
        }
        Ok(Err(e)) => {
            warn!(error = %e, "inference task panicked");
            return;
        }
        Err(_) => {
            // Stale result is worse than no result; the next window
            // supersedes this one
            warn!(
                timeout_ms = config.inference_timeout_ms,
                participant = ?participant,
                "inference timed out, window discarded"
            );
            return;
        }
    };

    let Some(text) = filter.apply(&result.text) else {
        debug!(text = %result.text, "transcript rejected as hallucination");
        return;
    };

    let transcript = Transcript {
        text,
        language: result.language,
        confidence: result.confidence,
        timestamp_ms,
        turnaround_ms: started.elapsed().as_millis() as u64,
        participant,
    };

    // Best effort: a closed client must not take the pipeline down
    if let Err(e) = sink.publish(transcript).await {
        debug!(error = %e, "transcript dropped, sink closed");
    }
}

/// Condition a window to 16 kHz mono i16, or `None` if gated as silence.
fn prepare_window(window: AudioWindow, config: &DispatchConfig) -> Result<Option<Vec<i16>>> {
    match window {
        AudioWindow::Encoded(bytes) => {
            let mut decoded = decode::decode_bytes(&bytes, None)?;
            // Only the trailing slice is new material worth transcribing
            decoded.truncate_to_tail(config.tail_window_ms);

            if level::dbfs(&decoded.samples) < config.silence_gate_dbfs {
                return Ok(None);
            }

            Ok(Some(resample::prepare_for_inference(
                &decoded.samples,
                decoded.channels,
                decoded.sample_rate,
            )))
        }
        AudioWindow::Pcm {
            samples,
            sample_rate,
        } => {
            if level::peak_i16(&samples) < config.peak_gate {
                return Ok(None);
            }
            if sample_rate == crate::defaults::SAMPLE_RATE {
                return Ok(Some(samples));
            }
            let f32_samples = resample::to_f32(&samples);
            Ok(Some(resample::prepare_for_inference(
                &f32_samples,
                1,
                sample_rate,
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::CollectorSink;
    use crate::stt::MockTranscriber;

    fn loud_pcm(ms: u32) -> AudioWindow {
        let n = (crate::defaults::SAMPLE_RATE as u64 * ms as u64 / 1000) as usize;
        AudioWindow::Pcm {
            samples: (0..n).map(|i| if i % 2 == 0 { 8000 } else { -8000 }).collect(),
            sample_rate: crate::defaults::SAMPLE_RATE,
        }
    }

    fn silent_pcm(ms: u32) -> AudioWindow {
        let n = (crate::defaults::SAMPLE_RATE as u64 * ms as u64 / 1000) as usize;
        AudioWindow::Pcm {
            samples: vec![0i16; n],
            sample_rate: crate::defaults::SAMPLE_RATE,
        }
    }

    fn request(window: AudioWindow) -> DispatchRequest {
        DispatchRequest {
            window,
            language: "en".to_string(),
            timestamp_ms: 42,
            participant: None,
        }
    }

    fn dispatcher_with(mock: MockTranscriber) -> Dispatcher {
        Dispatcher::new(
            SharedEngine::preloaded(Arc::new(mock)),
            Arc::new(HallucinationFilter::new()),
            DispatchConfig::default(),
        )
    }

    #[tokio::test]
    async fn dispatches_loud_window_to_sink() {
        let mock = MockTranscriber::new("base").with_response("hello world");
        let dispatcher = dispatcher_with(mock.clone());
        let sink = Arc::new(CollectorSink::new());
        let inflight = Arc::new(AtomicBool::new(false));

        let outcome = dispatcher.try_dispatch(
            Arc::clone(&inflight),
            request(loud_pcm(600)),
            sink.clone(),
        );
        let DispatchOutcome::Started(task) = outcome else {
            panic!("expected Started");
        };
        task.await.unwrap();

        let transcripts = sink.transcripts();
        assert_eq!(transcripts.len(), 1);
        assert_eq!(transcripts[0].text, "hello world");
        assert_eq!(transcripts[0].timestamp_ms, 42);
        assert_eq!(mock.call_count(), 1);
        assert!(!inflight.load(Ordering::SeqCst), "flag must clear");
    }

    #[tokio::test]
    async fn silent_window_never_reaches_model() {
        let mock = MockTranscriber::new("base");
        let dispatcher = dispatcher_with(mock.clone());
        let sink = Arc::new(CollectorSink::new());
        let inflight = Arc::new(AtomicBool::new(false));

        let outcome =
            dispatcher.try_dispatch(Arc::clone(&inflight), request(silent_pcm(600)), sink.clone());
        let DispatchOutcome::Started(task) = outcome else {
            panic!("expected Started");
        };
        task.await.unwrap();

        assert_eq!(mock.call_count(), 0);
        assert_eq!(sink.count(), 0);
        assert!(!inflight.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn busy_session_skips_window() {
        let dispatcher = dispatcher_with(MockTranscriber::new("base"));
        let sink = Arc::new(CollectorSink::new());
        let inflight = Arc::new(AtomicBool::new(true)); // already busy

        let outcome = dispatcher.try_dispatch(inflight, request(loud_pcm(600)), sink);
        assert!(matches!(outcome, DispatchOutcome::Busy));
    }

    #[tokio::test]
    async fn empty_engine_reports_not_ready() {
        let dispatcher = Dispatcher::new(
            SharedEngine::empty(),
            Arc::new(HallucinationFilter::new()),
            DispatchConfig::default(),
        );
        let sink = Arc::new(CollectorSink::new());
        let inflight = Arc::new(AtomicBool::new(false));

        let outcome = dispatcher.try_dispatch(inflight, request(loud_pcm(600)), sink);
        assert!(matches!(outcome, DispatchOutcome::NotReady));
    }

    #[tokio::test]
    async fn timed_out_inference_is_discarded() {
        let mock = MockTranscriber::new("slow").with_latency(Duration::from_millis(300));
        let mut config = DispatchConfig::default();
        config.inference_timeout_ms = 50;
        let dispatcher = Dispatcher::new(
            SharedEngine::preloaded(Arc::new(mock)),
            Arc::new(HallucinationFilter::new()),
            config,
        );
        let sink = Arc::new(CollectorSink::new());
        let inflight = Arc::new(AtomicBool::new(false));

        let outcome =
            dispatcher.try_dispatch(Arc::clone(&inflight), request(loud_pcm(600)), sink.clone());
        let DispatchOutcome::Started(task) = outcome else {
            panic!("expected Started");
        };
        task.await.unwrap();

        assert_eq!(sink.count(), 0, "timed-out result must not be delivered");
        assert!(!inflight.load(Ordering::SeqCst), "flag must clear on timeout");
    }

    #[tokio::test]
    async fn hallucinated_transcript_is_filtered() {
        let mock = MockTranscriber::new("base").with_response("Thank you.");
        let dispatcher = dispatcher_with(mock);
        let sink = Arc::new(CollectorSink::new());
        let inflight = Arc::new(AtomicBool::new(false));

        let outcome =
            dispatcher.try_dispatch(Arc::clone(&inflight), request(loud_pcm(600)), sink.clone());
        let DispatchOutcome::Started(task) = outcome else {
            panic!("expected Started");
        };
        task.await.unwrap();

        assert_eq!(sink.count(), 0);
    }

    #[tokio::test]
    async fn failing_transcriber_is_treated_as_not_ready() {
        // with_failure reports not-ready, so dispatch degrades before spawn
        let mock = MockTranscriber::new("base").with_failure();
        let dispatcher = dispatcher_with(mock);
        let sink = Arc::new(CollectorSink::new());
        let inflight = Arc::new(AtomicBool::new(false));

        let outcome = dispatcher.try_dispatch(inflight, request(loud_pcm(600)), sink);
        assert!(matches!(outcome, DispatchOutcome::NotReady));
    }

    #[test]
    fn prepare_window_resamples_pcm() {
        let config = DispatchConfig::default();
        let window = AudioWindow::Pcm {
            samples: vec![8000i16; 48000], // 1s at 48 kHz
            sample_rate: 48000,
        };
        let samples = prepare_window(window, &config).unwrap().unwrap();
        assert_eq!(samples.len(), 16000);
    }

    #[test]
    fn prepare_window_gates_quiet_pcm() {
        let config = DispatchConfig::default();
        // Peak 100/32768 ≈ 0.003, below the 0.005 gate
        let window = AudioWindow::Pcm {
            samples: vec![100i16; 9600],
            sample_rate: 16000,
        };
        assert!(prepare_window(window, &config).unwrap().is_none());
    }

    #[test]
    fn prepare_window_decodes_wav_snapshot() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..16000 {
                writer
                    .write_sample(if i % 2 == 0 { 8000i16 } else { -8000 })
                    .unwrap();
            }
            writer.finalize().unwrap();
        }

        let config = DispatchConfig::default();
        let samples = prepare_window(AudioWindow::Encoded(cursor.into_inner()), &config)
            .unwrap()
            .unwrap();
        assert_eq!(samples.len(), 16000);
    }

    #[test]
    fn prepare_window_rejects_garbage() {
        let config = DispatchConfig::default();
        let window = AudioWindow::Encoded(vec![0xde, 0xad, 0xbe, 0xef]);
        assert!(prepare_window(window, &config).is_err());
    }
}
