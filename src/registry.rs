//! Session registry.
//!
//! Owns every token pairing, the binding between a token and the relay
//! connection that presented it, and the pairing between live connections.
//! All of it lives behind one [`Guarded`] lock so a teardown is observed
//! as a single step.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::collections::BiMap;
use crate::error::MatchError;
use crate::models::{ConnectionId, Token};
use crate::protocol::{Envelope, Outbound, GAME_ENDED, PEER_LEFT, SERVER_CLOSING};
use crate::sync::Guarded;

/// Channel feeding a connection's writer task.
pub type Outbox = mpsc::UnboundedSender<Outbound>;

/// Sent to a waiting side when its partner never showed up.
pub const PEER_TIMED_OUT: &str = "Other user did not connect in time";

const DISCONNECT_BACKOFF_START: Duration = Duration::from_millis(10);
const DISCONNECT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Result of attaching a connection to its token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    /// Token bound, partner not connected yet.
    AwaitingPeer,
    /// Both sides bound, forwarding is active.
    Paired { peer: ConnectionId },
}

/// Snapshot of registry counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub token_pairs: usize,
    pub pending_pairs: usize,
    pub active_pairings: usize,
}

/// A connection that presented a valid token.
struct Attached {
    token: Token,
    outbox: Outbox,
}

impl Attached {
    fn send(&self, msg: impl Into<Outbound>) -> bool {
        self.outbox.send(msg.into()).is_ok()
    }

    fn end(&self, notice: &str) {
        self.send(Envelope::message(notice));
        self.send(Outbound::Close);
    }
}

#[derive(Default)]
struct RegistryState {
    /// Token pairs minted by the matchmaker.
    pairs: BiMap<Token>,
    /// Mint tick for tokens whose pair is not yet connected on both ends.
    minted_at: HashMap<Token, u64>,
    /// Token -> the connection that presented it.
    bindings: HashMap<Token, ConnectionId>,
    /// Connection -> its token and outbox (the reverse binding).
    connections: HashMap<ConnectionId, Attached>,
    /// Connections forwarding to each other.
    links: BiMap<ConnectionId>,
    /// Minted token sides that no connection has presented yet.
    unclaimed_sides: usize,
}

impl RegistryState {
    /// Tear down the pair `token` belongs to. Every bound connection other
    /// than `origin` gets `notice` and is closed.
    ///
    /// Returns whether anything was removed; a second call is a no-op.
    fn teardown(&mut self, token: Token, origin: Option<ConnectionId>, notice: &str) -> bool {
        let partner = self.pairs.get(&token).copied();
        let known = self.pairs.remove(&token);
        let mut removed = known;

        for side in std::iter::once(token).chain(partner) {
            self.minted_at.remove(&side);
            match self.bindings.remove(&side) {
                Some(conn) => {
                    removed = true;
                    self.links.remove(&conn);
                    if let Some(attached) = self.connections.remove(&conn) {
                        if Some(conn) != origin {
                            attached.end(notice);
                        }
                    }
                }
                None if known => {
                    self.unclaimed_sides = self.unclaimed_sides.saturating_sub(1);
                }
                None => {}
            }
        }

        removed
    }
}

/// Shared registry of token pairs and relay connections.
pub struct SessionRegistry {
    state: Guarded<RegistryState>,
}

impl SessionRegistry {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            state: Guarded::new("registry", RegistryState::default(), lock_timeout),
        }
    }

    /// Mint a fresh pair of mutually associated tokens.
    pub async fn mint_pair(&self, now: u64) -> Result<(Token, Token), MatchError> {
        let mut state = self.state.lock().await?;
        let first = Token::generate();
        let second = Token::generate();
        if first == second || state.pairs.contains(&first) || state.pairs.contains(&second) {
            return Err(MatchError::MintFailed("token collision"));
        }

        state.pairs.set(first, second);
        state.minted_at.insert(first, now);
        state.minted_at.insert(second, now);
        state.unclaimed_sides += 2;
        Ok((first, second))
    }

    /// Whether `token` belongs to a pair that has not been torn down.
    pub async fn is_known(&self, token: &Token) -> Result<bool, MatchError> {
        Ok(self.state.lock().await?.pairs.contains(token))
    }

    /// The subset of `tokens` whose pair has not been torn down.
    pub async fn known_among(&self, tokens: &[Token]) -> Result<HashSet<Token>, MatchError> {
        let state = self.state.lock().await?;
        Ok(tokens
            .iter()
            .filter(|token| state.pairs.contains(token))
            .copied()
            .collect())
    }

    pub async fn partner(&self, token: &Token) -> Result<Option<Token>, MatchError> {
        Ok(self.state.lock().await?.pairs.get(token).copied())
    }

    /// Whether `max_pending_pairs` minted pairs are still waiting for
    /// connections.
    pub async fn pending_limit_reached(&self, max_pending_pairs: usize) -> Result<bool, MatchError> {
        let state = self.state.lock().await?;
        Ok(state.unclaimed_sides >= max_pending_pairs.saturating_mul(2))
    }

    /// Bind `conn` to `token`. When the partner token is already bound the
    /// two connections are paired and both are told so; otherwise `conn` is
    /// told to wait.
    pub async fn attach(
        &self,
        token: Token,
        conn: ConnectionId,
        outbox: Outbox,
    ) -> Result<AttachOutcome, MatchError> {
        let mut state = self.state.lock().await?;

        let partner = state
            .pairs
            .get(&token)
            .copied()
            .ok_or(MatchError::InvalidToken)?;

        match state.bindings.get(&token) {
            Some(existing) if *existing != conn => return Err(MatchError::TokenInUse(token)),
            Some(_) => {
                return Ok(match state.links.get(&conn) {
                    Some(peer) => AttachOutcome::Paired { peer: *peer },
                    None => AttachOutcome::AwaitingPeer,
                });
            }
            None => {}
        }

        state.bindings.insert(token, conn);
        state.connections.insert(conn, Attached { token, outbox });
        state.unclaimed_sides = state.unclaimed_sides.saturating_sub(1);

        let Some(peer) = state.bindings.get(&partner).copied() else {
            if let Some(attached) = state.connections.get(&conn) {
                attached.send(Envelope::waiting());
            }
            return Ok(AttachOutcome::AwaitingPeer);
        };

        state.links.set(conn, peer);
        state.minted_at.remove(&token);
        state.minted_at.remove(&partner);
        for side in [conn, peer] {
            if let Some(attached) = state.connections.get(&side) {
                attached.send(Envelope::valid());
            }
        }
        Ok(AttachOutcome::Paired { peer })
    }

    /// Queue `payload` for the connection paired with `from`.
    pub async fn forward(&self, from: ConnectionId, payload: String) -> Result<(), MatchError> {
        let state = self.state.lock().await?;
        let peer = state.links.get(&from).ok_or(MatchError::NotPaired)?;
        match state.connections.get(peer) {
            Some(attached) if attached.send(Outbound::Payload(payload)) => Ok(()),
            _ => Err(MatchError::NotPaired),
        }
    }

    /// Tear down whatever pairing `conn` took part in. The peer, if any, is
    /// notified and closed. Safe to call more than once.
    pub async fn disconnect(&self, conn: ConnectionId) -> Result<bool, MatchError> {
        let mut state = self.state.lock().await?;
        let Some(token) = state.connections.get(&conn).map(|a| a.token) else {
            return Ok(false);
        };
        Ok(state.teardown(token, Some(conn), PEER_LEFT))
    }

    /// [`disconnect`](Self::disconnect), retried with backoff until the
    /// registry lock is obtained. The registry keeps `conn`'s outbox until
    /// this returns.
    pub async fn disconnect_eventually(&self, conn: ConnectionId) -> bool {
        let mut backoff = DISCONNECT_BACKOFF_START;
        loop {
            match self.disconnect(conn).await {
                Ok(removed) => return removed,
                Err(e) => {
                    tracing::warn!(%conn, error = %e, retry_in = ?backoff, "teardown failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(DISCONNECT_BACKOFF_MAX);
                }
            }
        }
    }

    /// End the game `token` belongs to from outside the relay. Both bound
    /// connections are notified and closed.
    ///
    /// Returns whether `token` had an active connection.
    pub async fn end_game(&self, token: Token) -> Result<bool, MatchError> {
        let mut state = self.state.lock().await?;
        let had_connection = state.bindings.contains_key(&token);
        state.teardown(token, None, GAME_ENDED);
        Ok(had_connection)
    }

    /// Invalidate a token whose holder abandoned matchmaking.
    pub async fn revoke(&self, token: Token) -> Result<bool, MatchError> {
        let mut state = self.state.lock().await?;
        Ok(state.teardown(token, None, PEER_LEFT))
    }

    /// Tear down pairs that were not connected on both ends within
    /// `window` ticks of being minted.
    pub async fn reap_expired(&self, now: u64, window: u64) -> Result<usize, MatchError> {
        let mut state = self.state.lock().await?;
        let expired: Vec<Token> = state
            .minted_at
            .iter()
            .filter(|(_, minted)| now.saturating_sub(**minted) >= window)
            .map(|(token, _)| *token)
            .collect();

        let mut reaped = 0;
        for token in expired {
            if state.pairs.contains(&token) && state.teardown(token, None, PEER_TIMED_OUT) {
                reaped += 1;
            }
        }
        if reaped > 0 {
            tracing::info!(reaped, "expired unclaimed token pairs");
        }
        Ok(reaped)
    }

    /// Notify and close every connection and forget all pairs.
    pub async fn shutdown(&self) -> Result<(), MatchError> {
        let mut state = self.state.lock().await?;
        for attached in state.connections.values() {
            attached.end(SERVER_CLOSING);
        }
        state.pairs.destroy();
        state.links.destroy();
        state.minted_at.clear();
        state.bindings.clear();
        state.connections.clear();
        state.unclaimed_sides = 0;
        Ok(())
    }

    pub async fn stats(&self) -> Result<RegistryStats, MatchError> {
        let state = self.state.lock().await?;
        Ok(RegistryStats {
            token_pairs: state.pairs.len(),
            pending_pairs: state.unclaimed_sides.div_ceil(2),
            active_pairings: state.links.len(),
        })
    }

    /// Token currently bound to `conn`.
    pub async fn token_of(&self, conn: ConnectionId) -> Result<Option<Token>, MatchError> {
        Ok(self.state.lock().await?.connections.get(&conn).map(|a| a.token))
    }

    /// Connection currently bound to `token`.
    pub async fn connection_of(&self, token: &Token) -> Result<Option<ConnectionId>, MatchError> {
        Ok(self.state.lock().await?.bindings.get(token).copied())
    }
}
