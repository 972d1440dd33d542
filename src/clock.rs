//! Coarse monotonic tick sources used for liveness checks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Something that can report the current tick.
pub trait TickSource: Send + Sync {
    fn now(&self) -> u64;
}

/// Ticks derived from a monotonic clock at a fixed granularity.
#[derive(Debug, Clone)]
pub struct SystemTicks {
    origin: Instant,
    tick: Duration,
}

impl SystemTicks {
    pub fn new(tick: Duration) -> Self {
        Self {
            origin: Instant::now(),
            tick,
        }
    }
}

impl TickSource for SystemTicks {
    fn now(&self) -> u64 {
        let tick_ms = self.tick.as_millis().max(1);
        (self.origin.elapsed().as_millis() / tick_ms) as u64
    }
}

/// A tick source that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualTicks(AtomicU64);

impl ManualTicks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ticks: u64) {
        self.0.fetch_add(ticks, Ordering::SeqCst);
    }

    pub fn set(&self, tick: u64) {
        self.0.store(tick, Ordering::SeqCst);
    }
}

impl TickSource for ManualTicks {
    fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_ticks() {
        let ticks = ManualTicks::new();
        assert_eq!(ticks.now(), 0);
        ticks.advance(5);
        assert_eq!(ticks.now(), 5);
        ticks.set(2);
        assert_eq!(ticks.now(), 2);
    }

    #[test]
    fn test_system_ticks_start_at_zero() {
        let ticks = SystemTicks::new(Duration::from_secs(3600));
        assert_eq!(ticks.now(), 0);
    }
}
