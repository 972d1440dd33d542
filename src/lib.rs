//! # quiz-match
//!
//! Pairs two anonymous quiz players and relays messages between them.
//!
//! Players join a bounded waiting queue and keep polling to stay eligible.
//! When two live players reach the head of the queue they each receive one
//! half of a token pair, then open a WebSocket to the relay with it. Once
//! both halves are connected every message from one side is forwarded to
//! the other; either side leaving ends the session for both.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use quiz_match::{Identity, MatchConfig, Matchmaker, PollOutcome, SessionRegistry};
//!
//! # async fn demo() -> Result<(), quiz_match::MatchError> {
//! let config = MatchConfig::default();
//! let registry = Arc::new(SessionRegistry::new(config.lock_timeout));
//! let matchmaker = Matchmaker::new(config, registry);
//!
//! let alice = Identity::new("alice")?;
//! matchmaker.join(alice.clone()).await?;
//! matchmaker.join(Identity::new("bob")?).await?;
//!
//! if let PollOutcome::Matched(token) = matchmaker.poll_and_claim(&alice).await? {
//!     println!("connect to ws://localhost:3001/?token={token}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod collections;
pub mod config;
mod error;
pub mod matchmaking;
mod models;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod sync;

pub use config::MatchConfig;
pub use error::{ConfigError, MatchError};
pub use matchmaking::{DrainOutcome, JoinOutcome, Matchmaker, NoPairReason, PollOutcome};
pub use models::{validate_identity, ConnectionId, Identity, Token};
pub use registry::{AttachOutcome, SessionRegistry};
pub use server::ServerConfig;
