//! Mutual exclusion with a bounded wait.

use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};

use crate::error::MatchError;

/// A value behind an async mutex whose acquisition gives up after a
/// timeout instead of waiting forever.
#[derive(Debug)]
pub struct Guarded<T> {
    name: &'static str,
    inner: Mutex<T>,
    timeout: Duration,
}

impl<T> Guarded<T> {
    pub fn new(name: &'static str, value: T, timeout: Duration) -> Self {
        Self {
            name,
            inner: Mutex::new(value),
            timeout,
        }
    }

    /// Acquire the lock, failing with [`MatchError::LockTimeout`] if it is
    /// not released within the configured timeout.
    pub async fn lock(&self) -> Result<MutexGuard<'_, T>, MatchError> {
        match tokio::time::timeout(self.timeout, self.inner.lock()).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                tracing::warn!(lock = self.name, timeout = ?self.timeout, "lock acquisition timed out");
                Err(MatchError::LockTimeout(self.name))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lock_and_release() {
        let guarded = Guarded::new("test", 1, Duration::from_millis(50));
        {
            let mut value = guarded.lock().await.unwrap();
            *value += 1;
        }
        assert_eq!(*guarded.lock().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_lock_times_out_when_held() {
        let guarded = Guarded::new("test", (), Duration::from_millis(20));
        let _held = guarded.lock().await.unwrap();
        let second = guarded.lock().await;
        assert!(matches!(second, Err(MatchError::LockTimeout("test"))));
    }
}
