//! Change notifier
//!
//! In-process pub/sub over (user, device). A push that commits wakes every
//! other subscribed device of the same user so it can issue a pull.
//! Signals carry no payload and coalesce: each subscription holds a 1-slot
//! channel, and a send into a full slot is dropped because a pending signal
//! already means "something to pull".

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

struct Subscription {
    seq: u64,
    tx: mpsc::Sender<()>,
}

/// Pub/sub registry of subscribed devices, keyed by (user, device).
///
/// Many `notify` callers read the map concurrently; subscribe and
/// unsubscribe take the write lock briefly. Channel lifetime equals the
/// transport session that subscribed.
pub struct ChangeNotifier {
    subscriptions: RwLock<HashMap<Uuid, HashMap<String, Subscription>>>,
    next_seq: AtomicU64,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            next_seq: AtomicU64::new(1),
        }
    }

    /// Register a device for signals.
    ///
    /// Returns the subscription token and the signal channel. An existing
    /// subscription for the same (user, device) is closed and replaced; its
    /// receiver observes the channel closing.
    pub fn subscribe(&self, user_id: Uuid, device_id: &str) -> (u64, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel(1);
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);

        let mut subs = self.subscriptions.write().unwrap();
        subs.entry(user_id)
            .or_default()
            .insert(device_id.to_string(), Subscription { seq, tx });

        debug!(%user_id, device_id, "notifier: subscribed");
        (seq, rx)
    }

    /// Remove a subscription, but only if it still belongs to the caller.
    ///
    /// The token keeps a session that was replaced by a reconnect from
    /// tearing down its successor's subscription.
    pub fn unsubscribe(&self, user_id: Uuid, device_id: &str, seq: u64) {
        let mut subs = self.subscriptions.write().unwrap();

        if let Some(devices) = subs.get_mut(&user_id) {
            if devices.get(device_id).is_some_and(|s| s.seq == seq) {
                devices.remove(device_id);
                debug!(%user_id, device_id, "notifier: unsubscribed");
            }
            if devices.is_empty() {
                subs.remove(&user_id);
            }
        }
    }

    /// Wake every subscribed device of `user_id` except `exclude_device_id`.
    ///
    /// Non-blocking: a device whose slot is already full keeps its single
    /// pending signal.
    pub fn notify(&self, user_id: Uuid, exclude_device_id: &str) {
        let subs = self.subscriptions.read().unwrap();

        if let Some(devices) = subs.get(&user_id) {
            for (device_id, sub) in devices {
                if device_id == exclude_device_id {
                    continue;
                }
                // Full slot or closed channel both mean there is nothing
                // more to say to this device right now.
                let _ = sub.tx.try_send(());
            }
        }
    }

    /// Number of subscribed devices for a user
    pub fn subscriber_count(&self, user_id: Uuid) -> usize {
        self.subscriptions
            .read()
            .unwrap()
            .get(&user_id)
            .map(|d| d.len())
            .unwrap_or(0)
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_notify_excludes_pushing_device() {
        let notifier = ChangeNotifier::new();
        let user = Uuid::new_v4();

        let (_s1, mut rx1) = notifier.subscribe(user, "d1");
        let (_s2, mut rx2) = notifier.subscribe(user, "d2");
        let (_s3, mut rx3) = notifier.subscribe(user, "d3");

        notifier.notify(user, "d1");

        assert!(rx2.try_recv().is_ok());
        assert!(rx3.try_recv().is_ok());
        assert!(rx1.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_notify_does_not_cross_users() {
        let notifier = ChangeNotifier::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let (_sa, mut rx_alice) = notifier.subscribe(alice, "d1");
        let (_sb, mut rx_bob) = notifier.subscribe(bob, "d1");

        notifier.notify(alice, "other");

        assert!(rx_alice.try_recv().is_ok());
        assert!(rx_bob.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_back_to_back_notifications_coalesce() {
        let notifier = ChangeNotifier::new();
        let user = Uuid::new_v4();

        let (_seq, mut rx) = notifier.subscribe(user, "d2");

        for _ in 0..5 {
            notifier.notify(user, "d1");
        }

        // Exactly one pending signal survives.
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_resubscribe_replaces_and_closes_old_channel() {
        let notifier = ChangeNotifier::new();
        let user = Uuid::new_v4();

        let (_old_seq, mut old_rx) = notifier.subscribe(user, "d1");
        let (_new_seq, mut new_rx) = notifier.subscribe(user, "d1");

        assert_eq!(notifier.subscriber_count(user), 1);

        // Old channel is closed; new one receives.
        assert!(old_rx.recv().await.is_none());
        notifier.notify(user, "other");
        assert!(new_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_stale_unsubscribe_keeps_replacement() {
        let notifier = ChangeNotifier::new();
        let user = Uuid::new_v4();

        let (old_seq, _old_rx) = notifier.subscribe(user, "d1");
        let (_new_seq, mut new_rx) = notifier.subscribe(user, "d1");

        // The replaced session tears down with its stale token.
        notifier.unsubscribe(user, "d1", old_seq);

        assert_eq!(notifier.subscriber_count(user), 1);
        notifier.notify(user, "other");
        assert!(new_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_unsubscribe_removes_device() {
        let notifier = ChangeNotifier::new();
        let user = Uuid::new_v4();

        let (seq, mut rx) = notifier.subscribe(user, "d1");
        notifier.unsubscribe(user, "d1", seq);

        assert_eq!(notifier.subscriber_count(user), 0);
        notifier.notify(user, "other");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_notify_without_subscribers_is_noop() {
        let notifier = ChangeNotifier::new();
        notifier.notify(Uuid::new_v4(), "d1");
    }
}
