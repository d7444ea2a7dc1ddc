//! Room transcription agent.
//!
//! One agent serves a whole room: each subscribed audio track gets its own
//! task that windows incoming PCM and feeds the dispatcher, and finished
//! transcripts go back to everyone over the data channel. Per-participant
//! language selections arrive as data messages on the config topic.

use crate::defaults;
use crate::dispatch::{AudioWindow, DispatchOutcome, DispatchRequest, Dispatcher};
use crate::error::Result;
use crate::rtc::{DataPublisher, ParticipantId, PcmFrame, RoomEvent};
use crate::sink::{Transcript, TranscriptSink};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// While an inference is in flight the track keeps accumulating, but never
/// beyond this many windows; the oldest audio is dropped first.
const MAX_PENDING_WINDOWS: usize = 5;

/// Config-topic message selecting a transcription language.
#[derive(Debug, Deserialize)]
struct ConfigMessage {
    #[serde(rename = "type")]
    kind: String,
    language: Option<String>,
}

/// Sink that serializes transcripts onto the room data channel.
struct DataChannelSink {
    publisher: Arc<dyn DataPublisher>,
}

#[async_trait]
impl TranscriptSink for DataChannelSink {
    async fn publish(&self, transcript: Transcript) -> Result<()> {
        let payload = serde_json::json!({
            "type": "transcript",
            "text": transcript.text,
            "isFinal": true,
            "timestamp": transcript.timestamp_ms,
            "participantId": transcript.participant,
            "turnaround_ms": transcript.turnaround_ms,
        });
        self.publisher
            .publish(defaults::TRANSCRIPTION_TOPIC, payload.to_string().into_bytes(), true)
            .await
    }
}

/// Handles for one subscribed track: the framing task plus whatever
/// inference it currently has in flight.
struct TrackHandle {
    task: JoinHandle<()>,
    inference: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl TrackHandle {
    /// Stop the framing task and cancel any in-flight inference; a result
    /// produced after teardown must never reach the room.
    fn abort(self) {
        self.task.abort();
        if let Ok(mut slot) = self.inference.lock()
            && let Some(inference) = slot.take()
        {
            inference.abort();
        }
    }
}

/// Drives transcription for every audio track in one room.
pub struct TranscriptionAgent {
    dispatcher: Dispatcher,
    publisher: Arc<dyn DataPublisher>,
    default_language: String,
    track_window_ms: u32,
    /// Language overrides received on the config topic.
    languages: Arc<Mutex<HashMap<ParticipantId, String>>>,
    tracks: HashMap<ParticipantId, TrackHandle>,
}

impl TranscriptionAgent {
    pub fn new(
        dispatcher: Dispatcher,
        publisher: Arc<dyn DataPublisher>,
        default_language: &str,
        track_window_ms: u32,
    ) -> Self {
        Self {
            dispatcher,
            publisher,
            default_language: default_language.to_string(),
            track_window_ms,
            languages: Arc::new(Mutex::new(HashMap::new())),
            tracks: HashMap::new(),
        }
    }

    /// Consume room events until the inbox closes, then cancel all tracks.
    pub async fn run(mut self, mut events: mpsc::Receiver<RoomEvent>) {
        while let Some(event) = events.recv().await {
            self.handle(event);
        }
        info!("room event stream closed, stopping {} track(s)", self.tracks.len());
        for (_, handle) in self.tracks.drain() {
            handle.abort();
        }
    }

    fn handle(&mut self, event: RoomEvent) {
        match event {
            RoomEvent::TrackSubscribed {
                participant,
                frames,
            } => {
                info!(participant = %participant, "audio track subscribed");
                // A resubscribe replaces the old task
                if let Some(old) = self.tracks.remove(&participant) {
                    old.abort();
                }
                let handle = self.spawn_track_task(participant.clone(), frames);
                self.tracks.insert(participant, handle);
            }
            RoomEvent::TrackUnsubscribed { participant } => {
                if let Some(handle) = self.tracks.remove(&participant) {
                    info!(participant = %participant, "audio track unsubscribed");
                    handle.abort();
                }
            }
            RoomEvent::ParticipantDisconnected { participant } => {
                if let Some(handle) = self.tracks.remove(&participant) {
                    handle.abort();
                }
                if let Ok(mut languages) = self.languages.lock() {
                    languages.remove(&participant);
                }
                info!(participant = %participant, "participant disconnected");
            }
            RoomEvent::DataReceived {
                participant,
                topic,
                payload,
            } => {
                if topic == defaults::CONFIG_TOPIC {
                    self.handle_config(&participant, &payload);
                }
            }
        }
    }

    fn handle_config(&self, participant: &str, payload: &[u8]) {
        let message: ConfigMessage = match serde_json::from_slice(payload) {
            Ok(m) => m,
            Err(e) => {
                warn!(participant = %participant, error = %e, "unparseable config message");
                return;
            }
        };
        if message.kind != "config" {
            return;
        }
        if let Some(language) = message.language {
            info!(participant = %participant, language = %language, "language selected");
            if let Ok(mut languages) = self.languages.lock() {
                languages.insert(participant.to_string(), language);
            }
        }
    }

    fn spawn_track_task(
        &self,
        participant: ParticipantId,
        mut frames: mpsc::Receiver<PcmFrame>,
    ) -> TrackHandle {
        let dispatcher = self.dispatcher.clone();
        let languages = Arc::clone(&self.languages);
        let default_language = self.default_language.clone();
        let window_ms = self.track_window_ms;
        let sink: Arc<dyn TranscriptSink> = Arc::new(DataChannelSink {
            publisher: Arc::clone(&self.publisher),
        });
        let inference: Arc<Mutex<Option<JoinHandle<()>>>> = Arc::new(Mutex::new(None));
        let inference_slot = Arc::clone(&inference);

        let task = tokio::spawn(async move {
            let inflight = Arc::new(AtomicBool::new(false));
            let mut pending: Vec<i16> = Vec::new();
            let mut sample_rate = defaults::SAMPLE_RATE;

            while let Some(frame) = frames.recv().await {
                if frame.samples.is_empty() {
                    continue;
                }
                sample_rate = frame.sample_rate;
                pending.extend_from_slice(&frame.samples);

                let window_samples =
                    (sample_rate as u64 * window_ms as u64 / 1000) as usize;
                if pending.len() < window_samples {
                    continue;
                }

                if inflight.load(Ordering::SeqCst) {
                    // Keep accumulating while busy, but bounded
                    let cap = window_samples * MAX_PENDING_WINDOWS;
                    if pending.len() > cap {
                        pending.drain(..pending.len() - cap);
                    }
                    continue;
                }

                let samples = std::mem::take(&mut pending);
                let request = DispatchRequest {
                    window: AudioWindow::Pcm {
                        samples,
                        sample_rate,
                    },
                    language: current_language(&languages, &participant, &default_language),
                    timestamp_ms: now_ms(),
                    participant: Some(participant.clone()),
                };
                match dispatcher.try_dispatch(Arc::clone(&inflight), request, Arc::clone(&sink)) {
                    DispatchOutcome::Started(task) => {
                        // Parked so teardown can abort it; a finished handle
                        // being replaced here is a no-op
                        if let Ok(mut slot) = inference_slot.lock() {
                            *slot = Some(task);
                        }
                    }
                    DispatchOutcome::Busy => {}
                    DispatchOutcome::NotReady => {
                        debug!(participant = %participant, "engine not ready, window dropped");
                    }
                }
            }
            debug!(participant = %participant, "track frame stream ended");
        });

        TrackHandle { task, inference }
    }
}

fn current_language(
    languages: &Mutex<HashMap<ParticipantId, String>>,
    participant: &str,
    default_language: &str,
) -> String {
    languages
        .lock()
        .ok()
        .and_then(|map| map.get(participant).cloned())
        .unwrap_or_else(|| default_language.to_string())
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
