//! Startup configuration for the matchmaker and relay.
//!
//! All values are fixed once the server starts.

use std::time::Duration;

use crate::error::ConfigError;

/// Default maximum number of identities waiting in the queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 500;
/// Default maximum number of minted pairs not yet connected on both ends.
pub const DEFAULT_MAX_PENDING_PAIRS: usize = 10;
/// Default tick granularity in milliseconds.
pub const DEFAULT_TICK_MS: u64 = 100;
/// Default recency window: 20 seconds at the default tick.
pub const DEFAULT_RECENCY_WINDOW_TICKS: u64 = 200;
/// Default claim window: 60 seconds at the default tick.
pub const DEFAULT_CLAIM_WINDOW_TICKS: u64 = 600;
/// Default bound on waiting for a shared lock, in milliseconds.
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 2_000;

/// Matchmaking and relay tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchConfig {
    /// Capacity of the waiting queue.
    pub queue_capacity: usize,
    /// Minting stops while this many pairs are still unclaimed.
    pub max_pending_pairs: usize,
    /// Duration of one liveness tick.
    pub tick: Duration,
    /// An identity is live while fewer than this many ticks passed since it
    /// last called in.
    pub recency_window_ticks: u64,
    /// A pair not connected on both ends after this many ticks is torn down.
    pub claim_window_ticks: u64,
    /// Longest wait for a shared lock before the operation fails.
    pub lock_timeout: Duration,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_pending_pairs: DEFAULT_MAX_PENDING_PAIRS,
            tick: Duration::from_millis(DEFAULT_TICK_MS),
            recency_window_ticks: DEFAULT_RECENCY_WINDOW_TICKS,
            claim_window_ticks: DEFAULT_CLAIM_WINDOW_TICKS,
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
        }
    }
}

impl MatchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity < 2 {
            return Err(ConfigError::CapacityTooSmall(self.queue_capacity));
        }
        if self.max_pending_pairs == 0 {
            return Err(ConfigError::Zero("max_pending_pairs"));
        }
        if self.tick.is_zero() {
            return Err(ConfigError::Zero("tick"));
        }
        if self.recency_window_ticks == 0 {
            return Err(ConfigError::Zero("recency_window_ticks"));
        }
        if self.claim_window_ticks == 0 {
            return Err(ConfigError::Zero("claim_window_ticks"));
        }
        if self.lock_timeout.is_zero() {
            return Err(ConfigError::Zero("lock_timeout"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(MatchConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_tiny_queue() {
        let config = MatchConfig {
            queue_capacity: 1,
            ..MatchConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::CapacityTooSmall(1))
        ));
    }

    #[test]
    fn test_rejects_zero_values() {
        let config = MatchConfig {
            tick: Duration::ZERO,
            ..MatchConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Zero("tick"))));
    }
}
