//! Error types for matchmaking and relay operations.

use thiserror::Error;

use crate::models::Token;

/// Errors surfaced by the matchmaking queue, session registry and relay.
///
/// Every variant is recoverable at the granularity of a single identity or
/// connection.
#[derive(Debug, Error)]
pub enum MatchError {
    /// The waiting queue is full.
    #[error("matchmaking queue is full ({capacity} waiting)")]
    CapacityExceeded { capacity: usize },

    /// The identity string failed validation.
    #[error("invalid identity: {0}")]
    InvalidIdentity(&'static str),

    /// The presented token is not associated with a game.
    #[error("invalid token not associated with a game")]
    InvalidToken,

    /// The token is already bound to another connection.
    #[error("token {0} is already in use by another connection")]
    TokenInUse(Token),

    /// A message could not be parsed as JSON.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// A message arrived on a connection that has no active pairing.
    #[error("no paired connection to forward to")]
    NotPaired,

    /// A shared lock could not be acquired in time.
    #[error("timed out waiting for the {0} lock")]
    LockTimeout(&'static str),

    /// A token pair could not be minted.
    #[error("failed to mint token pair: {0}")]
    MintFailed(&'static str),
}

impl From<serde_json::Error> for MatchError {
    fn from(err: serde_json::Error) -> Self {
        MatchError::MalformedPayload(err.to_string())
    }
}

/// Errors raised while validating startup configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("queue capacity must be at least 2, got {0}")]
    CapacityTooSmall(usize),
}
