//! Cookie-backed flash messages.
//!
//! [`flash_messages`] loads the `messages` cookie into a [`Flash`] handle in
//! the request extensions. Handlers add or take messages through the
//! handle; whatever is left afterwards is written back to the cookie, and
//! the cookie is removed once everything has been read.

use std::convert::Infallible;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use tracing::debug;

use pipeline_realtime::NotificationLevel;

/// Name of the cookie holding pending messages.
pub const FLASH_COOKIE: &str = "messages";

/// One queued message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub level: NotificationLevel,
    pub message: String,
    /// Free-form metadata, JSON for notification messages.
    #[serde(default)]
    pub extra_tags: String,
}

impl FlashMessage {
    pub fn new(
        level: NotificationLevel,
        message: impl Into<String>,
        extra_tags: impl Into<String>,
    ) -> Self {
        Self {
            level,
            message: message.into(),
            extra_tags: extra_tags.into(),
        }
    }
}

/// Shared handle to the current request's messages.
#[derive(Debug, Clone, Default)]
pub struct Flash {
    messages: Arc<Mutex<Vec<FlashMessage>>>,
}

impl Flash {
    pub fn from_messages(messages: Vec<FlashMessage>) -> Self {
        Self {
            messages: Arc::new(Mutex::new(messages)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<FlashMessage>> {
        self.messages.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add(&self, message: FlashMessage) {
        self.lock().push(message);
    }

    /// Remove and return every queued message.
    pub fn take(&self) -> Vec<FlashMessage> {
        std::mem::take(&mut *self.lock())
    }

    /// Queued messages, left in place.
    pub fn peek(&self) -> Vec<FlashMessage> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outside [`flash_messages`] this yields a detached, empty handle.
impl<S: Send + Sync> FromRequestParts<S> for Flash {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Flash>().cloned().unwrap_or_default())
    }
}

pub fn encode_messages(messages: &[FlashMessage]) -> String {
    let json = serde_json::to_vec(messages).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

/// Decode a cookie value. A tampered or stale value yields no messages.
pub fn decode_messages(value: &str) -> Vec<FlashMessage> {
    URL_SAFE_NO_PAD
        .decode(value)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .unwrap_or_default()
}

/// Middleware that round-trips flash messages through the cookie.
pub async fn flash_messages(
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> (CookieJar, Response) {
    let had_cookie = jar.get(FLASH_COOKIE).is_some();
    let loaded = jar
        .get(FLASH_COOKIE)
        .map(|c| decode_messages(c.value()))
        .unwrap_or_default();

    let flash = Flash::from_messages(loaded);
    request.extensions_mut().insert(flash.clone());

    let response = next.run(request).await;

    let remaining = flash.take();
    let jar = if !remaining.is_empty() {
        debug!(count = remaining.len(), "Storing flash messages");
        jar.add(
            Cookie::build((FLASH_COOKIE, encode_messages(&remaining)))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax),
        )
    } else if had_cookie {
        jar.remove(Cookie::build(FLASH_COOKIE).path("/"))
    } else {
        jar
    };
    (jar, response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_value_round_trip() {
        let messages = vec![
            FlashMessage::new(NotificationLevel::Success, "Saved", r#"{"title":"Done"}"#),
            FlashMessage::new(NotificationLevel::Error, "Ünïcode failure", ""),
        ];
        let encoded = encode_messages(&messages);
        assert!(!encoded.contains(';'));
        assert_eq!(decode_messages(&encoded), messages);
    }

    #[test]
    fn test_garbage_cookie_is_ignored() {
        assert!(decode_messages("%%%not-base64").is_empty());
        assert!(decode_messages(&URL_SAFE_NO_PAD.encode("not json")).is_empty());
    }

    #[test]
    fn test_take_empties_handle() {
        let flash = Flash::default();
        flash.add(FlashMessage::new(NotificationLevel::Info, "a", ""));
        let clone = flash.clone();
        assert_eq!(clone.len(), 1);
        assert_eq!(flash.take().len(), 1);
        assert!(clone.is_empty());
    }
}
