//! Per-user write serialization
//!
//! Every read-modify-write on a user's graph runs while holding that user's
//! mutex, so concurrent requests for one user apply one after another while
//! different users proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry size above which idle entries are dropped on acquire
const PRUNE_THRESHOLD: usize = 1024;

/// Lazily populated map of user id to async mutex
#[derive(Clone, Default)]
pub struct UserLocks {
    inner: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `user_id`'s graph
    ///
    /// The returned guard releases the lock when dropped.
    pub async fn acquire(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            if map.len() > PRUNE_THRESHOLD {
                // Entries only referenced by the map have no holder or waiter
                map.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            map.entry(user_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_user_is_exclusive() {
        let locks = UserLocks::new();
        let guard = locks.acquire("u1").await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire("u1").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("waiter should acquire after release")
            .unwrap();
    }

    #[tokio::test]
    async fn test_different_users_do_not_block() {
        let locks = UserLocks::new();
        let _u1 = locks.acquire("u1").await;

        tokio::time::timeout(Duration::from_secs(1), locks.acquire("u2"))
            .await
            .expect("other user must not wait");

        assert_eq!(locks.inner.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn test_released_entries_are_pruned() {
        let locks = UserLocks::new();
        for i in 0..=PRUNE_THRESHOLD + 1 {
            drop(locks.acquire(&format!("user-{}", i)).await);
        }

        assert_eq!(locks.inner.lock().await.len(), 1);
    }
}
