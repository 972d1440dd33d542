//! Matchmaking service.
//!
//! Identities wait in a bounded FIFO and stay eligible only while they keep
//! calling in. Every poll attempts a drain: the first two live identities
//! are taken from the head and a token pair is minted for them in the
//! [`SessionRegistry`]. Each side later presents its token to the relay.
//!
//! Lock order is always queue, then registry.

mod queue;

use std::sync::Arc;

use serde::Serialize;

use crate::clock::{SystemTicks, TickSource};
use crate::config::MatchConfig;
use crate::error::MatchError;
use crate::models::{Identity, Token};
use crate::registry::SessionRegistry;
use crate::sync::Guarded;

pub use queue::{JoinOutcome, MatchQueue, NoPairReason};

/// Result of a drain attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Two identities were matched. The first drained holds the first token.
    Paired {
        first: (Identity, Token),
        second: (Identity, Token),
    },
    /// Nothing was matched this round.
    NoPair(NoPairReason),
}

/// Result of a client polling for its match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A token is ready; connect to the relay with it.
    Matched(Token),
    /// Still waiting.
    Pending,
    /// Not in the queue and holding no token. Join again.
    NotQueued,
}

/// Queue and registry counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MatchStats {
    pub waiting: usize,
    pub capacity: usize,
    pub token_pairs: usize,
    pub pending_pairs: usize,
    pub active_pairings: usize,
}

pub struct Matchmaker {
    config: MatchConfig,
    clock: Arc<dyn TickSource>,
    queue: Guarded<MatchQueue>,
    registry: Arc<SessionRegistry>,
}

impl Matchmaker {
    /// Create a matchmaker ticking on the monotonic clock.
    pub fn new(config: MatchConfig, registry: Arc<SessionRegistry>) -> Self {
        let clock = Arc::new(SystemTicks::new(config.tick));
        Self::with_clock(config, registry, clock)
    }

    pub fn with_clock(
        config: MatchConfig,
        registry: Arc<SessionRegistry>,
        clock: Arc<dyn TickSource>,
    ) -> Self {
        let queue = MatchQueue::new(config.queue_capacity, config.recency_window_ticks);
        Self {
            queue: Guarded::new("queue", queue, config.lock_timeout),
            config,
            clock,
            registry,
        }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Enter the waiting queue, or refresh liveness if already waiting.
    pub async fn join(&self, identity: Identity) -> Result<JoinOutcome, MatchError> {
        let mut queue = self.queue.lock().await?;

        if let Some(token) = queue.claim(&identity) {
            if self.registry.is_known(&token).await? {
                tracing::debug!(%identity, "join from identity already matched");
                return Ok(JoinOutcome::AlreadyQueued);
            }
            queue.release_claim(&identity);
        }

        let now = self.clock.now();
        match queue.enqueue(identity.clone(), now) {
            Ok(outcome) => {
                tracing::info!(%identity, ?outcome, waiting = queue.len(), "join");
                Ok(outcome)
            }
            Err(e) => {
                tracing::warn!(%identity, error = %e, "join rejected");
                Err(e)
            }
        }
    }

    /// Try to match the first two live identities in the queue.
    pub async fn drain(&self) -> Result<DrainOutcome, MatchError> {
        let mut queue = self.queue.lock().await?;
        self.drain_locked(&mut queue).await
    }

    async fn drain_locked(&self, queue: &mut MatchQueue) -> Result<DrainOutcome, MatchError> {
        let now = self.clock.now();
        self.registry
            .reap_expired(now, self.config.claim_window_ticks)
            .await?;
        self.forget_ended_claims(queue).await?;

        if self
            .registry
            .pending_limit_reached(self.config.max_pending_pairs)
            .await?
        {
            tracing::debug!("too many unclaimed pairs, not matching");
            return Ok(DrainOutcome::NoPair(NoPairReason::PendingLimit));
        }

        let (first, second) = match queue.take_live_pair(now) {
            Ok(pair) => pair,
            Err(reason) => return Ok(DrainOutcome::NoPair(reason)),
        };

        let minted = self.registry.mint_pair(now).await;
        Ok(Self::record_mint(queue, first, second, minted))
    }

    /// Hand the minted tokens to the pair, or put both identities back at
    /// the head when minting failed.
    fn record_mint(
        queue: &mut MatchQueue,
        first: Identity,
        second: Identity,
        minted: Result<(Token, Token), MatchError>,
    ) -> DrainOutcome {
        match minted {
            Ok((first_token, second_token)) => {
                tracing::info!(
                    first = %first,
                    second = %second,
                    "matched identities"
                );
                let first = (first, first_token);
                let second = (second, second_token);
                queue.settle(first.clone(), second.clone());
                DrainOutcome::Paired { first, second }
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not mint tokens, restoring pair");
                queue.restore(first, second);
                DrainOutcome::NoPair(NoPairReason::MintFailed)
            }
        }
    }

    /// Drop claims whose pair the registry has already torn down.
    async fn forget_ended_claims(&self, queue: &mut MatchQueue) -> Result<(), MatchError> {
        let claimed = queue.claimed_tokens();
        if claimed.is_empty() {
            return Ok(());
        }
        let live = self.registry.known_among(&claimed).await?;
        let dropped = queue.retain_claims(|token| live.contains(token));
        if dropped > 0 {
            tracing::debug!(dropped, "forgot claims of ended games");
        }
        Ok(())
    }

    /// Poll for a match. Keeps a waiting identity alive, runs a drain and
    /// reports the identity's token if it has one.
    pub async fn poll_and_claim(&self, identity: &Identity) -> Result<PollOutcome, MatchError> {
        let mut queue = self.queue.lock().await?;

        if let Some(token) = queue.claim(identity) {
            if self.registry.is_known(&token).await? {
                return Ok(PollOutcome::Matched(token));
            }
            tracing::debug!(%identity, "discarding token of a torn down pair");
            queue.release_claim(identity);
            return Ok(PollOutcome::NotQueued);
        }

        if !queue.refresh(identity, self.clock.now()) {
            return Ok(PollOutcome::NotQueued);
        }

        if let DrainOutcome::NoPair(reason) = self.drain_locked(&mut queue).await? {
            tracing::trace!(%identity, ?reason, "no pair yet");
        }

        Ok(match queue.claim(identity) {
            Some(token) => PollOutcome::Matched(token),
            None => PollOutcome::Pending,
        })
    }

    /// Give up a token before connecting with it. The pair is torn down so
    /// the partner is not left waiting. The queue itself is untouched.
    pub async fn release_token(&self, identity: &Identity) -> Result<(), MatchError> {
        let mut queue = self.queue.lock().await?;
        if let Some(token) = queue.release_claim(identity) {
            let revoked = self.registry.revoke(token).await?;
            tracing::info!(%identity, revoked, "token released");
        }
        Ok(())
    }

    /// Leave the waiting queue. Returns whether the identity was waiting.
    pub async fn leave(&self, identity: &Identity) -> Result<bool, MatchError> {
        let left = self.queue.lock().await?.remove(identity);
        if left {
            tracing::info!(%identity, "left queue");
        }
        Ok(left)
    }

    /// End the game `token` belongs to. Returns whether the token had an
    /// active connection.
    pub async fn end_game(&self, token: Token) -> Result<bool, MatchError> {
        let ended = self.registry.end_game(token).await?;
        tracing::info!(%token, ended, "end game requested");
        Ok(ended)
    }

    pub async fn stats(&self) -> Result<MatchStats, MatchError> {
        let (waiting, capacity) = {
            let queue = self.queue.lock().await?;
            (queue.len(), queue.capacity())
        };
        let registry = self.registry.stats().await?;
        Ok(MatchStats {
            waiting,
            capacity,
            token_pairs: registry.token_pairs,
            pending_pairs: registry.pending_pairs,
            active_pairings: registry.active_pairings,
        })
    }
}
