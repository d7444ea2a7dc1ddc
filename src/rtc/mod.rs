//! Media-SDK (LiveKit-compatible) integration.
//!
//! The SDK connection itself lives outside this crate; whatever owns it
//! translates room callbacks into [`RoomEvent`]s and pushes them into the
//! [`agent::TranscriptionAgent`] inbox, and provides a [`DataPublisher`] for
//! outbound data-channel messages. That keeps the per-participant pipeline
//! testable without a live media server.

pub mod agent;
pub mod token;

pub use agent::TranscriptionAgent;
pub use token::TokenIssuer;

use crate::error::Result;
use async_trait::async_trait;

/// Room-unique participant identity.
pub type ParticipantId = String;

/// One decoded PCM frame from a subscribed audio track.
#[derive(Debug, Clone)]
pub struct PcmFrame {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

/// Room activity the agent reacts to.
pub enum RoomEvent {
    /// An audio track was subscribed; frames arrive on the receiver until
    /// the track ends.
    TrackSubscribed {
        participant: ParticipantId,
        frames: tokio::sync::mpsc::Receiver<PcmFrame>,
    },
    /// The track went away; the participant may resubscribe later.
    TrackUnsubscribed { participant: ParticipantId },
    /// A data-channel message arrived on some topic.
    DataReceived {
        participant: ParticipantId,
        topic: String,
        payload: Vec<u8>,
    },
    /// The participant left the room entirely.
    ParticipantDisconnected { participant: ParticipantId },
}

impl std::fmt::Debug for RoomEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TrackSubscribed { participant, .. } => f
                .debug_struct("TrackSubscribed")
                .field("participant", participant)
                .finish_non_exhaustive(),
            Self::TrackUnsubscribed { participant } => f
                .debug_struct("TrackUnsubscribed")
                .field("participant", participant)
                .finish(),
            Self::DataReceived {
                participant, topic, ..
            } => f
                .debug_struct("DataReceived")
                .field("participant", participant)
                .field("topic", topic)
                .finish_non_exhaustive(),
            Self::ParticipantDisconnected { participant } => f
                .debug_struct("ParticipantDisconnected")
                .field("participant", participant)
                .finish(),
        }
    }
}

/// Outbound data-channel publisher, implemented by the SDK adapter.
#[async_trait]
pub trait DataPublisher: Send + Sync {
    /// Publish a payload to every participant on the given topic.
    async fn publish(&self, topic: &str, payload: Vec<u8>, reliable: bool) -> Result<()>;
}
