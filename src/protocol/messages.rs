//! Envelopes exchanged with relay clients.
//!
//! All envelopes are serialized as JSON over WebSocket. Once a connection is
//! paired, application payloads travel verbatim and are never wrapped.

use serde::{Deserialize, Serialize};

/// Pairing progress reported to a relay client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    /// Token accepted, the other side has not connected yet.
    #[serde(rename = "CONNECTION WAITING")]
    Waiting,
    /// Both sides connected, forwarding is active.
    #[serde(rename = "CONNECTION VALID")]
    Valid,
}

/// Messages sent from the relay to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Envelope {
    Status { status: ConnectionStatus },
    Error { error: String },
    Message { message: String },
}

impl Envelope {
    pub fn waiting() -> Self {
        Envelope::Status {
            status: ConnectionStatus::Waiting,
        }
    }

    pub fn valid() -> Self {
        Envelope::Status {
            status: ConnectionStatus::Valid,
        }
    }

    pub fn error(reason: impl Into<String>) -> Self {
        Envelope::Error {
            error: reason.into(),
        }
    }

    pub fn message(text: impl Into<String>) -> Self {
        Envelope::Message {
            message: text.into(),
        }
    }

    pub fn to_json(&self) -> String {
        // Envelopes only hold strings, serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Sent to the remaining side when its partner leaves.
pub const PEER_LEFT: &str = "Connection closed from other end";
/// Sent to both sides when a game is ended externally.
pub const GAME_ENDED: &str = "Game ended";
/// Sent to every connection on shutdown.
pub const SERVER_CLOSING: &str = "Server is shutting down";

/// Work queued for a connection's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// A relay envelope.
    Envelope(Envelope),
    /// A peer's payload, forwarded as-is.
    Payload(String),
    /// Send a close frame and stop writing.
    Close,
}

impl From<Envelope> for Outbound {
    fn from(envelope: Envelope) -> Self {
        Outbound::Envelope(envelope)
    }
}
