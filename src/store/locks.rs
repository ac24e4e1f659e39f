//! Per-key asynchronous locks.
//!
//! Operations on different keys proceed concurrently; operations on the same
//! key are serialized for the whole read-modify-write, including awaits on
//! the backend.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Held lock for one key. Dropping it releases the key.
pub type KeyGuard = OwnedMutexGuard<()>;

/// A lazily grown table of one async mutex per key.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    table: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut table = self.table.lock();
        // Drop idle entries so the table tracks live keys only.
        if table.len() > 1024 {
            table.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        table
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Wait for exclusive access to `key`.
    pub async fn lock(&self, key: &str) -> KeyGuard {
        self.slot(key).lock_owned().await
    }

    /// Lock several keys at once, in sorted order, skipping duplicates.
    pub async fn lock_many(&self, keys: &[&str]) -> Vec<KeyGuard> {
        let mut sorted: Vec<&str> = keys.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let mut guards = Vec::with_capacity(sorted.len());
        for key in sorted {
            guards.push(self.lock(key).await);
        }
        guards
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = KeyedLocks::new();
        let guard = locks.lock("a").await;

        let blocked = tokio::time::timeout(Duration::from_millis(20), locks.lock("a")).await;
        assert!(blocked.is_err());

        drop(guard);
        let reacquired = tokio::time::timeout(Duration::from_millis(20), locks.lock("a")).await;
        assert!(reacquired.is_ok());
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks = KeyedLocks::new();
        let _a = locks.lock("a").await;
        let b = tokio::time::timeout(Duration::from_millis(20), locks.lock("b")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_lock_many_dedups_keys() {
        let locks = KeyedLocks::new();
        let guards = locks.lock_many(&["b", "a", "b"]).await;
        assert_eq!(guards.len(), 2);
    }

    #[tokio::test]
    async fn test_opposite_order_pairs_do_not_deadlock() {
        let locks = Arc::new(KeyedLocks::new());
        let mut handles = Vec::new();
        for i in 0..20 {
            let locks = Arc::clone(&locks);
            handles.push(tokio::spawn(async move {
                let keys = if i % 2 == 0 { ["x", "y"] } else { ["y", "x"] };
                let _guards = locks.lock_many(&keys).await;
                tokio::task::yield_now().await;
            }));
        }

        let all = futures::future::join_all(handles);
        let joined = tokio::time::timeout(Duration::from_secs(5), all).await;
        assert!(joined.is_ok());
    }
}
