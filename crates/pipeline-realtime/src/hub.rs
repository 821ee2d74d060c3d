//! Per-user live delivery with a store fallback.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{debug, info};

use pipeline_core::config::notification::NotificationConfig;

use crate::notification::Notification;
use crate::store::NotificationStore;

/// Where [`NotificationHub::publish`] put a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Sent to this many open streams.
    Live(usize),
    /// Kept in the store until the user connects.
    Stored,
}

/// Routes notifications to users' open SSE streams.
///
/// Each user with at least one open stream has a broadcast channel. Users
/// without one get the notification parked in the [`NotificationStore`],
/// which the next stream drains on connect.
#[derive(Debug)]
pub struct NotificationHub {
    channels: DashMap<String, broadcast::Sender<Notification>>,
    store: Arc<NotificationStore>,
    capacity: usize,
}

impl NotificationHub {
    pub fn new(store: Arc<NotificationStore>, capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            store,
            capacity: capacity.max(1),
        }
    }

    pub fn from_config(store: Arc<NotificationStore>, config: &NotificationConfig) -> Self {
        Self::new(store, config.channel_capacity)
    }

    pub fn store(&self) -> &Arc<NotificationStore> {
        &self.store
    }

    /// Open a live receiver for `user_id`.
    pub fn subscribe(&self, user_id: &str) -> broadcast::Receiver<Notification> {
        self.channels
            .entry(user_id.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Drop the channel of `user_id` once no receiver is left.
    pub fn release(&self, user_id: &str) {
        if self
            .channels
            .remove_if(user_id, |_, tx| tx.receiver_count() == 0)
            .is_some()
        {
            debug!(user_id, "Released notification channel");
        }
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.channels
            .get(user_id)
            .is_some_and(|tx| tx.receiver_count() > 0)
    }

    /// Number of users with an open stream.
    pub fn online_count(&self) -> usize {
        self.channels
            .iter()
            .filter(|entry| entry.value().receiver_count() > 0)
            .count()
    }

    pub fn publish(&self, user_id: &str, notification: Notification) -> Delivery {
        let notification = match self.channels.get(user_id) {
            Some(tx) => match tx.send(notification) {
                Ok(receivers) => {
                    debug!(user_id, receivers, "Delivered notification live");
                    return Delivery::Live(receivers);
                }
                Err(broadcast::error::SendError(unsent)) => unsent,
            },
            None => notification,
        };
        info!(user_id, "Added notification for user {user_id}: {}", notification.message);
        self.store.add(user_id, notification);
        Delivery::Stored
    }

    /// Publish to each listed user.
    ///
    /// With `None` the notification is addressed to every user. There is
    /// no user directory here, so that case is only logged. Returns the
    /// number of users the notification was handed to.
    pub fn broadcast(&self, user_ids: Option<&[String]>, notification: &Notification) -> usize {
        match user_ids {
            None => {
                info!("Broadcasting notification to all users: {}", notification.message);
                0
            }
            Some(ids) => {
                for user_id in ids {
                    self.publish(user_id, notification.clone());
                }
                ids.len()
            }
        }
    }
}
