//! WebSocket streaming endpoint.
//!
//! The browser sends base64-encoded chunks of its MediaRecorder stream as
//! JSON text frames; every chunk lands in the session buffer and triggers a
//! dispatch attempt on the full buffered snapshot. Transcripts flow back on
//! the same socket. A malformed frame earns an error message, never a
//! disconnect.

use crate::defaults;
use crate::dispatch::{AudioWindow, DispatchOutcome, DispatchRequest};
use crate::server::AppState;
use crate::session::Session;
use crate::sink::{ChannelSink, Transcript, TranscriptSink};
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Messages the client sends.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// One chunk of the encoded audio stream.
    AudioChunk {
        /// Base64-encoded bytes of the stream chunk.
        data: String,
        #[serde(default = "default_chunk_language")]
        language: String,
        /// Client clock, milliseconds. Echoed back on the transcript.
        #[serde(default)]
        timestamp: u64,
    },
    Ping,
}

fn default_chunk_language() -> String {
    defaults::CHUNK_LANGUAGE.to_string()
}

/// Messages the server sends.
#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once on connect so the client can render engine state.
    Status { whisper_ready: bool, mode: String },
    Transcript {
        text: String,
        timestamp: u64,
        #[serde(rename = "isFinal")]
        is_final: bool,
        turnaround_ms: u64,
        id: String,
    },
    Error { message: String },
    Pong,
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Serializes outbound messages from both sources onto the socket: direct
/// replies from the read loop and transcripts from finished inferences.
async fn write_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut replies: mpsc::Receiver<ServerMessage>,
    mut transcripts: mpsc::Receiver<Transcript>,
) {
    loop {
        let message = tokio::select! {
            reply = replies.recv() => match reply {
                Some(reply) => reply,
                None => break,
            },
            transcript = transcripts.recv() => match transcript {
                Some(t) => ServerMessage::Transcript {
                    text: t.text,
                    timestamp: t.timestamp_ms,
                    is_final: true,
                    turnaround_ms: t.turnaround_ms,
                    id: uuid::Uuid::new_v4().to_string(),
                },
                None => break,
            },
        };
        let Ok(text) = serde_json::to_string(&message) else {
            continue;
        };
        if sender.send(Message::Text(text.into())).await.is_err() {
            break;
        }
    }
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let mut session = Session::new(
        state.config.buffer.max_bytes,
        state.config.buffer.header_reserve,
        defaults::CHUNK_LANGUAGE,
    );
    info!(session = %session.id(), "websocket session opened");

    let (sender, receiver) = socket.split();
    let (reply_tx, reply_rx) = mpsc::channel::<ServerMessage>(32);
    let (transcript_tx, transcript_rx) = mpsc::channel::<Transcript>(32);
    let writer = tokio::spawn(write_loop(sender, reply_rx, transcript_rx));
    let sink: Arc<dyn TranscriptSink> = Arc::new(ChannelSink::new(transcript_tx));

    read_loop(receiver, &mut session, &state, &reply_tx, &sink).await;

    // Cancels any in-flight inference; its result has nowhere to go
    session.teardown();
    drop(reply_tx);
    writer.abort();
    info!(session = %session.id(), "websocket session closed");
}

/// Generic over the message stream so tests can drive the protocol without
/// a live socket.
async fn read_loop<S>(
    mut receiver: S,
    session: &mut Session,
    state: &AppState,
    replies: &mpsc::Sender<ServerMessage>,
    sink: &Arc<dyn TranscriptSink>,
) where
    S: Stream<Item = std::result::Result<Message, axum::Error>> + Unpin,
{
    let ready = state.engine.is_ready();
    if replies
        .send(ServerMessage::Status {
            whisper_ready: ready,
            mode: "live".to_string(),
        })
        .await
        .is_err()
    {
        return;
    }

    let mut warned_not_ready = false;

    while let Some(Ok(message)) = receiver.next().await {
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            // Binary, ping, pong frames are not part of the protocol
            _ => continue,
        };

        let parsed: ClientMessage = match serde_json::from_str(&text) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!(session = %session.id(), error = %e, "malformed client message");
                let reply = ServerMessage::Error {
                    message: format!("invalid message: {}", e),
                };
                if replies.send(reply).await.is_err() {
                    break;
                }
                continue;
            }
        };

        match parsed {
            ClientMessage::Ping => {
                if replies.send(ServerMessage::Pong).await.is_err() {
                    break;
                }
            }
            ClientMessage::AudioChunk {
                data,
                language,
                timestamp,
            } => {
                let bytes = match BASE64.decode(&data) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let reply = ServerMessage::Error {
                            message: format!("invalid base64 audio: {}", e),
                        };
                        if replies.send(reply).await.is_err() {
                            break;
                        }
                        continue;
                    }
                };

                session.buffer.append(&bytes);
                session.language = language;

                let request = DispatchRequest {
                    window: AudioWindow::Encoded(session.buffer.snapshot()),
                    language: session.language.clone(),
                    timestamp_ms: timestamp,
                    participant: None,
                };
                match state.dispatcher.try_dispatch(
                    session.inflight_flag(),
                    request,
                    Arc::clone(sink),
                ) {
                    DispatchOutcome::Started(task) => session.set_task(task),
                    DispatchOutcome::Busy => {}
                    DispatchOutcome::NotReady => {
                        if !warned_not_ready {
                            warned_not_ready = true;
                            warn!(session = %session.id(), "chunk received before model loaded");
                            let reply = ServerMessage::Error {
                                message: "transcription model still loading".to_string(),
                            };
                            if replies.send(reply).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            }
        }
    }
}
