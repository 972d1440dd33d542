//! Waiting-queue state.

use std::collections::HashMap;

use crate::collections::RingQueue;
use crate::error::MatchError;
use crate::models::{Identity, Token};

/// Result of a successful join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Appended to the tail of the queue.
    Queued,
    /// Already waiting (timestamp refreshed) or already matched.
    AlreadyQueued,
}

/// Why a drain attempt produced no pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoPairReason {
    /// Too many minted pairs are still waiting for their connections.
    PendingLimit,
    /// Fewer than two live identities were waiting.
    TooFewWaiting,
    /// One live identity was found; it keeps its place at the head.
    PartnerMissing,
    /// Tokens could not be minted; both identities keep their places.
    MintFailed,
}

/// FIFO of waiting identities plus their liveness stamps and the tokens
/// handed out to identities already matched.
///
/// An identity is in the ring exactly when it has a stamp.
#[derive(Debug)]
pub struct MatchQueue {
    ring: RingQueue<Identity>,
    last_seen: HashMap<Identity, u64>,
    claims: HashMap<Identity, Token>,
    recency_window: u64,
}

impl MatchQueue {
    pub fn new(capacity: usize, recency_window: u64) -> Self {
        Self {
            ring: RingQueue::with_capacity(capacity),
            last_seen: HashMap::new(),
            claims: HashMap::new(),
            recency_window,
        }
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    pub fn is_queued(&self, identity: &Identity) -> bool {
        self.last_seen.contains_key(identity)
    }

    /// Identities in drain order.
    pub fn waiting(&self) -> impl Iterator<Item = &Identity> {
        self.ring.iter()
    }

    /// Whether `identity` called in fewer than `recency_window` ticks ago.
    pub fn is_live(&self, identity: &Identity, now: u64) -> bool {
        self.last_seen
            .get(identity)
            .is_some_and(|seen| now.saturating_sub(*seen) < self.recency_window)
    }

    /// Add `identity` at the tail, or refresh it if it is already waiting.
    pub fn enqueue(&mut self, identity: Identity, now: u64) -> Result<JoinOutcome, MatchError> {
        if self.refresh(&identity, now) {
            return Ok(JoinOutcome::AlreadyQueued);
        }
        let capacity = self.capacity();
        self.ring
            .push_back(identity.clone())
            .map_err(|_| MatchError::CapacityExceeded { capacity })?;
        self.last_seen.insert(identity, now);
        Ok(JoinOutcome::Queued)
    }

    /// Stamp a waiting identity as seen at `now`. Returns false if it is not
    /// waiting.
    pub fn refresh(&mut self, identity: &Identity, now: u64) -> bool {
        match self.last_seen.get_mut(identity) {
            Some(seen) => {
                *seen = now;
                true
            }
            None => false,
        }
    }

    /// Drop `identity` from the queue.
    pub fn remove(&mut self, identity: &Identity) -> bool {
        if self.last_seen.remove(identity).is_none() {
            return false;
        }
        self.ring.retain(|queued| queued != identity);
        true
    }

    /// Take the first two live identities from the head, discarding stale
    /// ones for good. A single live identity is put back where it was.
    pub fn take_live_pair(&mut self, now: u64) -> Result<(Identity, Identity), NoPairReason> {
        if self.ring.len() < 2 {
            return Err(NoPairReason::TooFewWaiting);
        }

        let mut live = Vec::with_capacity(2);
        while live.len() < 2 {
            let Some(identity) = self.ring.pop_front() else {
                break;
            };
            if self.is_live(&identity, now) {
                live.push(identity);
            } else {
                tracing::debug!(%identity, "evicting stale identity");
                self.last_seen.remove(&identity);
            }
        }

        let mut live = live.into_iter();
        match (live.next(), live.next()) {
            (Some(first), Some(second)) => Ok((first, second)),
            (Some(only), None) => {
                // Room is guaranteed: it was just popped.
                let _ = self.ring.push_front(only);
                Err(NoPairReason::PartnerMissing)
            }
            _ => Err(NoPairReason::TooFewWaiting),
        }
    }

    /// Put a pair taken by [`take_live_pair`](Self::take_live_pair) back at
    /// the head in its original order.
    pub fn restore(&mut self, first: Identity, second: Identity) {
        let _ = self.ring.push_front(second);
        let _ = self.ring.push_front(first);
    }

    /// Record the tokens minted for a pair; both leave the waiting set.
    pub fn settle(&mut self, first: (Identity, Token), second: (Identity, Token)) {
        for (identity, token) in [first, second] {
            self.last_seen.remove(&identity);
            self.claims.insert(identity, token);
        }
    }

    pub fn claim(&self, identity: &Identity) -> Option<Token> {
        self.claims.get(identity).copied()
    }

    pub fn release_claim(&mut self, identity: &Identity) -> Option<Token> {
        self.claims.remove(identity)
    }

    /// Tokens currently handed out to matched identities.
    pub fn claimed_tokens(&self) -> Vec<Token> {
        self.claims.values().copied().collect()
    }

    /// Drop every claim whose token fails `keep`. Returns how many went.
    pub fn retain_claims(&mut self, mut keep: impl FnMut(&Token) -> bool) -> usize {
        let before = self.claims.len();
        self.claims.retain(|_, token| keep(token));
        before - self.claims.len()
    }

    pub fn claim_count(&self) -> usize {
        self.claims.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> Identity {
        Identity::new(name).unwrap()
    }

    fn names(queue: &MatchQueue) -> Vec<&str> {
        queue.waiting().map(Identity::as_str).collect()
    }

    #[test]
    fn test_enqueue_and_refresh() {
        let mut queue = MatchQueue::new(4, 10);
        assert_eq!(queue.enqueue(id("alice"), 0).unwrap(), JoinOutcome::Queued);
        assert_eq!(
            queue.enqueue(id("alice"), 7).unwrap(),
            JoinOutcome::AlreadyQueued
        );
        assert_eq!(queue.len(), 1);
        assert!(queue.is_live(&id("alice"), 16));
        assert!(!queue.is_live(&id("alice"), 17));
    }

    #[test]
    fn test_full_queue_rejects_without_side_effects() {
        let mut queue = MatchQueue::new(2, 10);
        queue.enqueue(id("a"), 0).unwrap();
        queue.enqueue(id("b"), 0).unwrap();
        let result = queue.enqueue(id("c"), 0);
        assert!(matches!(
            result,
            Err(MatchError::CapacityExceeded { capacity: 2 })
        ));
        assert!(!queue.is_queued(&id("c")));
        assert_eq!(names(&queue), vec!["a", "b"]);
    }

    #[test]
    fn test_take_live_pair_in_fifo_order() {
        let mut queue = MatchQueue::new(8, 10);
        for name in ["a", "b", "c"] {
            queue.enqueue(id(name), 0).unwrap();
        }
        let (first, second) = queue.take_live_pair(1).unwrap();
        assert_eq!((first.as_str(), second.as_str()), ("a", "b"));
        assert_eq!(names(&queue), vec!["c"]);
    }

    #[test]
    fn test_stale_identities_are_dropped_for_good() {
        let mut queue = MatchQueue::new(8, 10);
        queue.enqueue(id("stale"), 0).unwrap();
        queue.enqueue(id("a"), 15).unwrap();
        queue.enqueue(id("b"), 15).unwrap();

        let (first, second) = queue.take_live_pair(20).unwrap();
        assert_eq!((first.as_str(), second.as_str()), ("a", "b"));
        assert!(!queue.is_queued(&id("stale")));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_lone_live_identity_keeps_its_place() {
        let mut queue = MatchQueue::new(8, 10);
        queue.enqueue(id("stale"), 0).unwrap();
        queue.enqueue(id("carol"), 15).unwrap();
        queue.enqueue(id("late"), 0).unwrap();

        let result = queue.take_live_pair(20);
        assert_eq!(result, Err(NoPairReason::PartnerMissing));
        assert_eq!(names(&queue), vec!["carol"]);
        assert!(queue.is_queued(&id("carol")));
        assert!(!queue.is_queued(&id("late")));
    }

    #[test]
    fn test_lone_identity_goes_back_before_later_arrivals() {
        let mut queue = MatchQueue::new(8, 10);
        queue.enqueue(id("carol"), 0).unwrap();
        queue.enqueue(id("gone"), 0).unwrap();
        queue.refresh(&id("carol"), 12);

        assert_eq!(queue.take_live_pair(12), Err(NoPairReason::PartnerMissing));
        queue.enqueue(id("dave"), 12).unwrap();
        assert_eq!(names(&queue), vec!["carol", "dave"]);
    }

    #[test]
    fn test_restore_keeps_order() {
        let mut queue = MatchQueue::new(8, 10);
        for name in ["a", "b", "c"] {
            queue.enqueue(id(name), 0).unwrap();
        }
        let (first, second) = queue.take_live_pair(0).unwrap();
        queue.restore(first, second);
        assert_eq!(names(&queue), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_settle_records_claims() {
        let mut queue = MatchQueue::new(8, 10);
        queue.enqueue(id("a"), 0).unwrap();
        queue.enqueue(id("b"), 0).unwrap();
        let (first, second) = queue.take_live_pair(0).unwrap();
        let (ta, tb) = (Token::generate(), Token::generate());
        queue.settle((first, ta), (second, tb));

        assert_eq!(queue.claim(&id("a")), Some(ta));
        assert_eq!(queue.claim(&id("b")), Some(tb));
        assert!(!queue.is_queued(&id("a")));
        assert_eq!(queue.release_claim(&id("a")), Some(ta));
        assert_eq!(queue.claim(&id("a")), None);
    }

    #[test]
    fn test_retain_claims() {
        let mut queue = MatchQueue::new(8, 10);
        for name in ["a", "b", "c", "d"] {
            queue.enqueue(id(name), 0).unwrap();
        }
        let (ta, tb, tc, td) = (
            Token::generate(),
            Token::generate(),
            Token::generate(),
            Token::generate(),
        );
        let (a, b) = queue.take_live_pair(0).unwrap();
        queue.settle((a, ta), (b, tb));
        let (c, d) = queue.take_live_pair(0).unwrap();
        queue.settle((c, tc), (d, td));
        assert_eq!(queue.claimed_tokens().len(), 4);

        assert_eq!(queue.retain_claims(|token| *token == tc || *token == td), 2);
        assert_eq!(queue.claim(&id("a")), None);
        assert_eq!(queue.claim(&id("c")), Some(tc));
        assert_eq!(queue.claim_count(), 2);
    }

    #[test]
    fn test_remove() {
        let mut queue = MatchQueue::new(8, 10);
        for name in ["a", "b", "c"] {
            queue.enqueue(id(name), 0).unwrap();
        }
        assert!(queue.remove(&id("b")));
        assert!(!queue.remove(&id("b")));
        assert_eq!(names(&queue), vec!["a", "c"]);
    }
}
