//! The SSE notification stream.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::Stream;
use serde_json::json;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{info, warn};

use pipeline_core::config::notification::NotificationConfig;

use crate::hub::NotificationHub;
use crate::notification::{Notification, SseEvent};

/// Timing of a [`NotificationStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSettings {
    pub tick: Duration,
    /// Heartbeat every N ticks, starting with the first.
    pub heartbeat_every: u64,
    pub max_connection: Duration,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self::from(&NotificationConfig::default())
    }
}

impl From<&NotificationConfig> for StreamSettings {
    fn from(config: &NotificationConfig) -> Self {
        Self {
            tick: config.tick(),
            heartbeat_every: config.heartbeat_interval.max(1),
            max_connection: config.max_connection(),
        }
    }
}

/// Live receiver that gives its hub channel back when dropped, including
/// when the client disconnects mid-stream.
struct Subscription {
    hub: Arc<NotificationHub>,
    user_id: String,
    rx: Option<broadcast::Receiver<Notification>>,
}

impl Subscription {
    async fn recv(&mut self) -> Result<Notification, RecvError> {
        match self.rx.as_mut() {
            Some(rx) => rx.recv().await,
            None => Err(RecvError::Closed),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.rx.take();
        self.hub.release(&self.user_id);
    }
}

async fn next_live(subscription: &mut Option<Subscription>) -> Result<Notification, RecvError> {
    match subscription {
        Some(sub) => sub.recv().await,
        None => std::future::pending().await,
    }
}

enum Step {
    Tick,
    Live(Result<Notification, RecvError>),
}

/// One client's notification stream.
///
/// Emits a `connection` event, then the user's stored notifications, then
/// live notifications as they are published, with a `heartbeat` every
/// `heartbeat_every` ticks. After `max_connection` it emits a final
/// `connection` timeout event and ends. Anonymous streams only receive
/// heartbeats.
#[derive(Debug, Clone)]
pub struct NotificationStream {
    hub: Arc<NotificationHub>,
    user_id: Option<String>,
    settings: StreamSettings,
}

impl NotificationStream {
    pub fn new(
        hub: Arc<NotificationHub>,
        user_id: Option<String>,
        settings: StreamSettings,
    ) -> Self {
        Self {
            hub,
            user_id,
            settings,
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = SseEvent> + Send + 'static {
        let Self {
            hub,
            user_id,
            settings,
        } = self;

        async_stream::stream! {
            let started = Instant::now();
            yield SseEvent::connection(json!({
                "status": "connected",
                "user": user_id.as_deref().unwrap_or("anonymous"),
                "timestamp": Utc::now().to_rfc3339(),
                "message": "SSE notification stream connected",
            }));

            // Subscribe before draining so nothing published in between is lost.
            let mut subscription = user_id.as_ref().map(|uid| Subscription {
                rx: Some(hub.subscribe(uid)),
                hub: hub.clone(),
                user_id: uid.clone(),
            });
            if let Some(uid) = &user_id {
                for pending in hub.store().pop(uid) {
                    yield SseEvent::notification(&pending);
                }
            }

            let mut ticker = interval(settings.tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut count: u64 = 0;

            loop {
                let step = tokio::select! {
                    _ = ticker.tick() => Step::Tick,
                    received = next_live(&mut subscription) => Step::Live(received),
                };

                match step {
                    Step::Tick => {
                        if started.elapsed() > settings.max_connection {
                            yield SseEvent::connection(json!({
                                "status": "timeout",
                                "message": "Connection timeout",
                            }));
                            break;
                        }
                        if count % settings.heartbeat_every == 0 {
                            yield SseEvent::heartbeat(count);
                        }
                        count += 1;
                    }
                    Step::Live(Ok(notification)) => yield SseEvent::notification(&notification),
                    Step::Live(Err(RecvError::Lagged(missed))) => {
                        warn!(user_id = ?user_id, missed, "SSE stream fell behind");
                        yield SseEvent::error(format!("Missed {missed} notifications"));
                        break;
                    }
                    Step::Live(Err(RecvError::Closed)) => {
                        warn!(user_id = ?user_id, "Notification channel closed");
                        yield SseEvent::error("Notification channel closed");
                        break;
                    }
                }
            }

            drop(subscription);
            info!(user_id = ?user_id, ticks = count, "SSE stream ended");
        }
    }
}
