//! `HtmxRequest` extractor: reads the `HX-*` request headers.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;

/// HTMX request details. A request without `HX-Request: true` extracts
/// with `enabled == false`; extraction never fails.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HtmxRequest {
    pub enabled: bool,
    pub boosted: bool,
    /// Id of the element that triggered the request.
    pub trigger: Option<String>,
    pub trigger_name: Option<String>,
    pub target: Option<String>,
    pub current_url: Option<String>,
    /// Swap style the client asked for (`HX-Swap`).
    pub swap: Option<String>,
    /// Raw `Accept` header.
    pub accept: Option<String>,
}

impl HtmxRequest {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let flag = |name: &str| get(name).is_some_and(|v| v.eq_ignore_ascii_case("true"));

        Self {
            enabled: flag("hx-request"),
            boosted: flag("hx-boosted"),
            trigger: get("hx-trigger"),
            trigger_name: get("hx-trigger-name"),
            target: get("hx-target"),
            current_url: get("hx-current-url"),
            swap: get("hx-swap"),
            accept: get("accept"),
        }
    }

    pub fn accepts_event_stream(&self) -> bool {
        self.accept
            .as_deref()
            .is_some_and(|accept| accept.contains("text/event-stream"))
    }

    /// Whether the request was triggered by the element with id `id`.
    pub fn triggered_by(&self, id: &str) -> bool {
        self.enabled && self.trigger.as_deref() == Some(id)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for HtmxRequest {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_plain_request() {
        let htmx = HtmxRequest::from_headers(&HeaderMap::new());
        assert!(!htmx.enabled);
        assert!(!htmx.accepts_event_stream());
    }

    #[test]
    fn test_htmx_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("HX-Request", HeaderValue::from_static("true"));
        headers.insert("HX-Trigger", HeaderValue::from_static("load-more"));
        headers.insert("HX-Target", HeaderValue::from_static("#items"));
        headers.insert("Accept", HeaderValue::from_static("text/html, text/event-stream"));

        let htmx = HtmxRequest::from_headers(&headers);
        assert!(htmx.enabled);
        assert!(htmx.triggered_by("load-more"));
        assert_eq!(htmx.target.as_deref(), Some("#items"));
        assert!(htmx.accepts_event_stream());
    }
}
