use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::MatchError;

/// Identity validation constants.
pub const IDENTITY_MIN_LENGTH: usize = 1;
pub const IDENTITY_MAX_LENGTH: usize = 64;

/// Validates an identity according to the rules.
///
/// Returns `Ok(())` if valid, or `Err` with an error message.
pub fn validate_identity(identity: &str) -> Result<(), &'static str> {
    let trimmed = identity.trim();

    if trimmed.chars().count() < IDENTITY_MIN_LENGTH {
        return Err("identity must not be empty");
    }

    if trimmed.chars().count() > IDENTITY_MAX_LENGTH {
        return Err("identity must be at most 64 characters");
    }

    if trimmed.chars().any(char::is_control) {
        return Err("identity must not contain control characters");
    }

    Ok(())
}

/// An anonymous client waiting for a match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    pub fn new(raw: impl AsRef<str>) -> Result<Self, MatchError> {
        let raw = raw.as_ref();
        validate_identity(raw).map_err(MatchError::InvalidIdentity)?;
        Ok(Self(raw.trim().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identity {
    type Error = MatchError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Identity::new(value)
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One half of a minted token pair, presented by a client when it opens
/// its relay connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token(Uuid);

impl Token {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl FromStr for Token {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| MatchError::InvalidToken)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

/// Identifies one accepted relay connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.simple().fmt(f)
    }
}
