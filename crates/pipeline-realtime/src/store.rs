//! Per-user notification store with time-based expiry.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use pipeline_core::config::notification::NotificationConfig;

use crate::notification::Notification;

#[derive(Debug, Clone)]
struct Entry {
    notification: Notification,
    added_at: DateTime<Utc>,
}

/// Holds notifications for users that have no open stream.
///
/// Entries older than the expiry are pruned on every add and get, and a
/// user whose list becomes empty is dropped. Nothing is persisted.
#[derive(Debug)]
pub struct NotificationStore {
    entries: Mutex<HashMap<String, Vec<Entry>>>,
    expiry: Duration,
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(3600))
    }
}

impl NotificationStore {
    pub fn new(expiry: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            expiry,
        }
    }

    pub fn from_config(config: &NotificationConfig) -> Self {
        Self::new(config.store_expiry())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<Entry>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn prune(&self, entries: &mut HashMap<String, Vec<Entry>>, user_id: &str, now: DateTime<Utc>) {
        let Some(list) = entries.get_mut(user_id) else {
            return;
        };
        let before = list.len();
        list.retain(|entry| {
            (now - entry.added_at)
                .to_std()
                .map(|age| age < self.expiry)
                .unwrap_or(true)
        });
        if list.len() < before {
            debug!(user_id, expired = before - list.len(), "Pruned expired notifications");
        }
        if list.is_empty() {
            entries.remove(user_id);
        }
    }

    pub fn add(&self, user_id: &str, notification: Notification) {
        self.add_at(user_id, notification, Utc::now());
    }

    pub fn add_at(&self, user_id: &str, notification: Notification, now: DateTime<Utc>) {
        let mut entries = self.lock();
        self.prune(&mut entries, user_id, now);
        entries.entry(user_id.to_string()).or_default().push(Entry {
            notification,
            added_at: now,
        });
    }

    /// Unexpired notifications for `user_id`, oldest first.
    pub fn get(&self, user_id: &str) -> Vec<Notification> {
        self.get_at(user_id, Utc::now())
    }

    pub fn get_at(&self, user_id: &str, now: DateTime<Utc>) -> Vec<Notification> {
        let mut entries = self.lock();
        self.prune(&mut entries, user_id, now);
        entries
            .get(user_id)
            .map(|list| list.iter().map(|e| e.notification.clone()).collect())
            .unwrap_or_default()
    }

    pub fn clear(&self, user_id: &str) {
        self.lock().remove(user_id);
    }

    /// Unexpired notifications for `user_id`, removing them from the store.
    pub fn pop(&self, user_id: &str) -> Vec<Notification> {
        self.pop_at(user_id, Utc::now())
    }

    pub fn pop_at(&self, user_id: &str, now: DateTime<Utc>) -> Vec<Notification> {
        let mut entries = self.lock();
        self.prune(&mut entries, user_id, now);
        entries
            .remove(user_id)
            .map(|list| list.into_iter().map(|e| e.notification).collect())
            .unwrap_or_default()
    }

    /// Number of users with stored notifications.
    pub fn user_count(&self) -> usize {
        self.lock().len()
    }

    /// Total stored notifications across users, expired ones included until
    /// their user is next touched.
    pub fn len(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_expired_notification_is_removed() {
        let store = NotificationStore::default();
        store.add_at("u-1", Notification::info("hello"), at(0));

        assert_eq!(store.get_at("u-1", at(3599)).len(), 1);
        assert!(store.get_at("u-1", at(3601)).is_empty());
        assert_eq!(store.user_count(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_add_prunes_older_entries() {
        let store = NotificationStore::new(Duration::from_secs(60));
        store.add_at("u-1", Notification::info("old"), at(0));
        store.add_at("u-1", Notification::info("new"), at(61));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get_at("u-1", at(62))[0].message, "new");
    }

    #[test]
    fn test_pop_drains_one_user() {
        let store = NotificationStore::default();
        store.add("u-1", Notification::info("a"));
        store.add("u-1", Notification::info("b"));
        store.add("u-2", Notification::info("c"));

        let popped: Vec<String> = store.pop("u-1").into_iter().map(|n| n.message).collect();
        assert_eq!(popped, vec!["a", "b"]);
        assert!(store.get("u-1").is_empty());
        assert_eq!(store.user_count(), 1);
    }

    #[test]
    fn test_clear_and_unknown_user() {
        let store = NotificationStore::default();
        assert!(store.get("nobody").is_empty());
        store.add("u-1", Notification::info("a"));
        store.clear("u-1");
        assert!(store.pop("u-1").is_empty());
    }

    #[test]
    fn test_clock_going_backwards_keeps_entries() {
        let store = NotificationStore::default();
        store.add_at("u-1", Notification::info("a"), at(10));
        assert_eq!(store.get_at("u-1", at(10) - TimeDelta::seconds(5)).len(), 1);
    }
}
