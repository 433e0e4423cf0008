//! Per-user sync locks
//!
//! Pushes for one user must serialize so the read-merge-commit sequence
//! stays consistent, while pulls may run concurrently with each other.
//! Each user gets a reader-writer lock: pulls take it shared, pushes take
//! it exclusive. Users are independent, so the registry hands out one lock
//! per user instead of a global one.
//!
//! The registry holds weak references. A user's entry dies with its last
//! holder and the sweep task drops the dead entries later.

use dashmap::DashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::trace;
use uuid::Uuid;

/// Registry of per-user reader-writer locks
pub struct UserLocks {
    locks: DashMap<Uuid, Weak<RwLock<()>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// The lock for a user, created on first use.
    ///
    /// Callers hold the returned `Arc` for the duration of their critical
    /// section; the registry itself keeps only a weak reference.
    pub fn for_user(&self, user_id: Uuid) -> Arc<RwLock<()>> {
        use dashmap::mapref::entry::Entry;

        match self.locks.entry(user_id) {
            Entry::Occupied(mut entry) => match entry.get().upgrade() {
                Some(lock) => lock,
                None => {
                    let lock = Arc::new(RwLock::new(()));
                    entry.insert(Arc::downgrade(&lock));
                    lock
                }
            },
            Entry::Vacant(entry) => {
                let lock = Arc::new(RwLock::new(()));
                entry.insert(Arc::downgrade(&lock));
                lock
            }
        }
    }

    /// Drop entries whose lock has no remaining holder
    pub fn sweep(&self) {
        let before = self.locks.len();
        self.locks.retain(|_, weak| weak.strong_count() > 0);
        let removed = before - self.locks.len();
        if removed > 0 {
            trace!(removed, "user lock registry swept");
        }
    }

    /// Number of registered entries, live or not
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Default for UserLocks {
    fn default() -> Self {
        Self::new()
    }
}

/// Periodically sweep released locks out of the registry
pub fn spawn_sweep_task(locks: Arc<UserLocks>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            locks.sweep();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_user_gets_same_lock() {
        let locks = UserLocks::new();
        let user = Uuid::new_v4();

        let a = locks.for_user(user);
        let b = locks.for_user(user);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_users_are_independent() {
        let locks = UserLocks::new();

        let alice = locks.for_user(Uuid::new_v4());
        let bob = locks.for_user(Uuid::new_v4());
        assert!(!Arc::ptr_eq(&alice, &bob));

        // Alice's exclusive hold does not block Bob.
        let _alice_guard = alice.write().await;
        assert!(bob.try_write().is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_pulls_share_the_lock() {
        let locks = UserLocks::new();
        let lock = locks.for_user(Uuid::new_v4());

        let first = lock.read().await;
        let second = lock.try_read();
        assert!(second.is_ok());
        drop(first);
    }

    #[tokio::test]
    async fn test_push_excludes_pulls_and_pushes() {
        let locks = UserLocks::new();
        let lock = locks.for_user(Uuid::new_v4());

        let pull_guard = lock.read().await;
        assert!(lock.try_write().is_err());
        drop(pull_guard);

        let push_guard = lock.write().await;
        assert!(lock.try_read().is_err());
        assert!(lock.try_write().is_err());
        drop(push_guard);
    }

    #[tokio::test]
    async fn test_sweep_drops_released_entries() {
        let locks = UserLocks::new();
        let held_user = Uuid::new_v4();

        let held = locks.for_user(held_user);
        let released = locks.for_user(Uuid::new_v4());
        drop(released);
        assert_eq!(locks.len(), 2);

        locks.sweep();
        assert_eq!(locks.len(), 1);

        // The held entry survives and is still the same lock.
        assert!(Arc::ptr_eq(&held, &locks.for_user(held_user)));
    }

    #[tokio::test]
    async fn test_entry_revives_after_release() {
        let locks = UserLocks::new();
        let user = Uuid::new_v4();

        drop(locks.for_user(user));
        // Dead weak entry is replaced on next acquisition.
        let lock = locks.for_user(user);
        assert!(lock.try_write().is_ok());
    }
}
