//! The notification dispatcher.

use std::collections::hash_map::DefaultHasher;
use std::convert::Infallible;
use std::fmt::Display;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE, LOCATION};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use futures::StreamExt;
use serde_json::{Map, Value, json};
use tracing::{error, warn};

use pipeline_cache::keys::canonical_json;
use pipeline_core::config::notification::NotificationConfig;
use pipeline_core::error::AppError;
use pipeline_core::result::AppResult;
use pipeline_realtime::{
    Notification, NotificationHub, NotificationLevel, NotificationStream, StreamSettings,
};

use super::options::NotifyOptions;
use super::request::NotifyRequest;
use crate::middleware::flash::{Flash, FlashMessage};

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");
const HX_TRIGGER: HeaderName = HeaderName::from_static("hx-trigger");
const HX_REDIRECT: HeaderName = HeaderName::from_static("hx-redirect");
const HX_RESWAP: HeaderName = HeaderName::from_static("hx-reswap");
const HX_RETARGET: HeaderName = HeaderName::from_static("hx-retarget");
const HX_SWAP: HeaderName = HeaderName::from_static("hx-swap");
const HX_TARGET: HeaderName = HeaderName::from_static("hx-target");

pub(crate) fn header_value(value: &str) -> AppResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| AppError::internal(format!("Invalid header value '{value}': {e}")))
}

/// `HX-Trigger` value for a JSON payload. Keys are sorted and non-ASCII
/// text is escaped so the value is always a valid header.
pub(crate) fn trigger_header(payload: &Value) -> AppResult<HeaderValue> {
    header_value(&canonical_json(payload))
}

/// Delivers notifications over whichever channel fits the request.
#[derive(Debug, Clone)]
pub struct Notifier {
    config: NotificationConfig,
    hub: Arc<NotificationHub>,
    settings: StreamSettings,
}

impl Notifier {
    pub fn new(config: NotificationConfig, hub: Arc<NotificationHub>) -> Self {
        Self {
            settings: StreamSettings::from(&config),
            config,
            hub,
        }
    }

    pub fn hub(&self) -> &Arc<NotificationHub> {
        &self.hub
    }

    pub fn config(&self) -> &NotificationConfig {
        &self.config
    }

    /// Build a notification, filling unset options from the configuration.
    pub fn build(
        &self,
        message: &str,
        level: NotificationLevel,
        options: &NotifyOptions,
    ) -> Notification {
        let mut notification = Notification::new(message, level)
            .with_title(options.title.clone())
            .with_icon(options.icon.clone())
            .with_duration(options.duration.unwrap_or(self.config.default_duration_ms))
            .with_position(
                options
                    .position
                    .clone()
                    .unwrap_or_else(|| self.config.default_position.clone()),
            )
            .with_data(options.data.clone())
            .with_tags(options.tags.clone())
            .with_redirect(options.redirect_url.clone())
            .replace_form(options.replace_form)
            .with_target(Some(
                options
                    .target
                    .clone()
                    .unwrap_or_else(|| self.config.default_target.clone()),
            ))
            .with_swap(
                options
                    .swap
                    .clone()
                    .unwrap_or_else(|| self.config.default_swap.clone()),
            );
        if let Some(source) = &options.source {
            notification = notification.with_source(source.clone());
        }
        notification
    }

    /// Deliver a notification for `request`.
    ///
    /// Returns the response the handler should send, or `None` when the
    /// notification went into the flash messages and the handler should
    /// render normally.
    pub fn show_notification(
        &self,
        request: Option<&NotifyRequest>,
        message: &str,
        level: NotificationLevel,
        options: NotifyOptions,
    ) -> AppResult<Option<Response>> {
        let Some(request) = request else {
            warn!("No request available for notification");
            return Ok(None);
        };

        if options.sse_stream {
            return Ok(Some(self.stream_response(request.user_id.clone())));
        }

        let mut notification = self.build(message, level, &options);

        if request.htmx.enabled {
            if request.htmx.accepts_event_stream() {
                return Ok(Some(single_event_response(&notification)));
            }

            if options.replace_form {
                notification.target = Some(
                    options
                        .target
                        .clone()
                        .unwrap_or_else(|| self.config.form_target.clone()),
                );
                notification.swap = "innerHTML".to_string();
            }

            if let Some(url) = &options.redirect_url {
                return htmx_redirect_response(url, &notification).map(Some);
            }

            let retarget = options.target.is_some() || options.replace_form;
            return htmx_notification_response(&notification, retarget).map(Some);
        }

        push_flash(&request.flash, &notification);

        match &options.redirect_url {
            Some(url) => Ok(Some(redirect_response(url)?)),
            None => Ok(None),
        }
    }

    /// [`Self::show_notification`] with a level name.
    pub fn send_notification(
        &self,
        request: Option<&NotifyRequest>,
        message: &str,
        level: &str,
        options: NotifyOptions,
    ) -> AppResult<Option<Response>> {
        let level: NotificationLevel = level.parse()?;
        self.show_notification(request, message, level, options)
    }

    pub fn add_success(
        &self,
        request: Option<&NotifyRequest>,
        message: &str,
        options: NotifyOptions,
    ) -> AppResult<Option<Response>> {
        self.show_notification(request, message, NotificationLevel::Success, options)
    }

    pub fn add_error(
        &self,
        request: Option<&NotifyRequest>,
        message: &str,
        options: NotifyOptions,
    ) -> AppResult<Option<Response>> {
        self.show_notification(request, message, NotificationLevel::Error, options)
    }

    pub fn add_warning(
        &self,
        request: Option<&NotifyRequest>,
        message: &str,
        options: NotifyOptions,
    ) -> AppResult<Option<Response>> {
        self.show_notification(request, message, NotificationLevel::Warning, options)
    }

    pub fn add_info(
        &self,
        request: Option<&NotifyRequest>,
        message: &str,
        options: NotifyOptions,
    ) -> AppResult<Option<Response>> {
        self.show_notification(request, message, NotificationLevel::Info, options)
    }

    pub fn add_debug(
        &self,
        request: Option<&NotifyRequest>,
        message: &str,
        options: NotifyOptions,
    ) -> AppResult<Option<Response>> {
        self.show_notification(request, message, NotificationLevel::Debug, options)
    }

    /// SSE notification stream for `request`'s user.
    pub fn send_notification_stream(&self, request: &NotifyRequest) -> Response {
        self.stream_response(request.user_id.clone())
    }

    /// Hand a notification to each listed user, live or stored. `None`
    /// addresses everyone and is only logged.
    pub fn broadcast_notification(
        &self,
        message: &str,
        level: NotificationLevel,
        title: &str,
        user_ids: Option<&[String]>,
    ) -> usize {
        let notification = Notification::new(message, level).with_title(title);
        self.hub.broadcast(user_ids, &notification)
    }

    /// Take the request's flash messages as notification dicts.
    pub fn get_notifications(&self, flash: &Flash) -> Vec<Value> {
        flash
            .take()
            .into_iter()
            .map(|message| self.flash_to_dict(message))
            .collect()
    }

    fn flash_to_dict(&self, message: FlashMessage) -> Value {
        let extra: Map<String, Value> =
            serde_json::from_str(&message.extra_tags).unwrap_or_default();
        let field = |key: &str, default: Value| extra.get(key).cloned().unwrap_or(default);

        let fallback_id = {
            let mut hasher = DefaultHasher::new();
            message.message.hash(&mut hasher);
            format!("msg_{}", hasher.finish())
        };
        let now = Utc::now().timestamp_micros() as f64 / 1_000_000.0;

        json!({
            "id": field("id", json!(fallback_id)),
            "message": message.message,
            "level": message.level.as_str(),
            "title": field("title", json!("")),
            "icon": field("icon", json!("")),
            "duration": field("duration", json!(self.config.default_duration_ms)),
            "data": field("data", json!({})),
            "source": field("source", json!("flash")),
            "timestamp": field("timestamp", json!(now)),
            "position": field("position", json!(self.config.default_position)),
        })
    }

    /// Error notification aimed at the form fragment.
    pub fn handle_validation_error(
        &self,
        request: Option<&NotifyRequest>,
        error_message: &str,
        redirect_to: Option<String>,
        target: Option<String>,
    ) -> AppResult<Option<Response>> {
        let options = NotifyOptions::new()
            .title("Validation Error")
            .duration(5000)
            .redirect_opt(redirect_to)
            .replace_form(true)
            .swap("innerHTML");
        let options = match target {
            Some(target) => options.target(target),
            None => options.target(self.config.form_target.clone()),
        };
        self.add_error(request, error_message, options)
    }

    /// Like [`Self::handle_validation_error`], logging `cause` first.
    pub fn handle_generic_error(
        &self,
        request: Option<&NotifyRequest>,
        error_message: &str,
        cause: Option<&dyn Display>,
        redirect_to: Option<String>,
        target: Option<String>,
    ) -> AppResult<Option<Response>> {
        if let Some(cause) = cause {
            error!("{error_message}: {cause}");
        }
        let options = NotifyOptions::new()
            .title("Error")
            .duration(5000)
            .redirect_opt(redirect_to)
            .replace_form(true)
            .swap("innerHTML")
            .target(target.unwrap_or_else(|| self.config.form_target.clone()));
        self.add_error(request, error_message, options)
    }

    /// Long-lived SSE response.
    pub fn stream_response(&self, user_id: Option<String>) -> Response {
        let events = NotificationStream::new(self.hub.clone(), user_id, self.settings)
            .into_stream()
            .map(|event| Ok::<Event, Infallible>(event.into()));

        let mut response = Sse::new(events).keep_alive(KeepAlive::default()).into_response();
        sse_headers(&mut response);
        response
    }
}

fn sse_headers(response: &mut Response) {
    let headers = response.headers_mut();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(X_ACCEL_BUFFERING, HeaderValue::from_static("no"));
}

fn single_event_response(notification: &Notification) -> Response {
    let mut response = Response::new(Body::from(notification.to_sse_format()));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    sse_headers(&mut response);
    response
}

fn htmx_redirect_response(url: &str, notification: &Notification) -> AppResult<Response> {
    let mut response = StatusCode::OK.into_response();
    let headers = response.headers_mut();
    headers.insert(HX_REDIRECT, header_value(url)?);
    headers.insert(HX_TRIGGER, trigger_header(&notification.to_htmx_trigger())?);
    Ok(response)
}

fn htmx_notification_response(notification: &Notification, retarget: bool) -> AppResult<Response> {
    let mut response = StatusCode::OK.into_response();
    let headers = response.headers_mut();
    headers.insert(HX_RESWAP, HeaderValue::from_static("none"));
    headers.insert(HX_SWAP, HeaderValue::from_static("none"));
    headers.insert(HX_TRIGGER, trigger_header(&notification.to_htmx_trigger())?);

    if let Some(target) = &notification.target {
        let target = header_value(target)?;
        let swap = header_value(&notification.swap)?;
        if retarget {
            headers.insert(HX_RETARGET, target.clone());
            headers.insert(HX_RESWAP, swap.clone());
        }
        headers.insert(HX_TARGET, target);
        headers.insert(HX_SWAP, swap);
    }
    Ok(response)
}

fn redirect_response(url: &str) -> AppResult<Response> {
    let mut response = StatusCode::FOUND.into_response();
    response.headers_mut().insert(LOCATION, header_value(url)?);
    Ok(response)
}

fn push_flash(flash: &Flash, notification: &Notification) {
    let extra = json!({
        "title": notification.title,
        "icon": notification.icon,
        "duration": notification.duration,
        "data": notification.data,
        "source": notification.source,
        "id": notification.id,
        "position": notification.position,
        "redirect_url": notification.redirect_url,
        "replace_form": notification.replace_form,
        "target": notification.target,
        "swap": notification.swap,
    });
    flash.add(FlashMessage::new(
        notification.level,
        notification.message.clone(),
        extra.to_string(),
    ));
}

#[cfg(test)]
mod tests {
    use pipeline_realtime::NotificationStore;

    use super::*;
    use crate::extractors::HtmxRequest;

    fn notifier() -> Notifier {
        let config = NotificationConfig::default();
        let hub = Arc::new(NotificationHub::new(Arc::new(NotificationStore::default()), 8));
        Notifier::new(config, hub)
    }

    fn htmx(accept: Option<&str>) -> NotifyRequest {
        NotifyRequest {
            htmx: HtmxRequest {
                enabled: true,
                accept: accept.map(str::to_string),
                ..HtmxRequest::default()
            },
            ..NotifyRequest::default()
        }
    }

    fn trigger(response: &Response) -> Value {
        let raw = response.headers()["hx-trigger"].to_str().unwrap();
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn test_htmx_request_gets_trigger_header() {
        let response = notifier()
            .add_success(Some(&htmx(None)), "Saved", NotifyOptions::new())
            .unwrap()
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(LOCATION).is_none());
        assert_eq!(response.headers()["hx-reswap"], "none");
        assert_eq!(response.headers()["hx-target"], ".notifications-init");
        assert_eq!(response.headers()["hx-swap"], "none");
        assert_eq!(trigger(&response)["showNotification"]["message"], "Saved");
        assert_eq!(trigger(&response)["showNotification"]["level"], "success");
    }

    #[test]
    fn test_plain_request_with_redirect_flashes_and_redirects() {
        let request = NotifyRequest::default();
        let response = notifier()
            .add_info(Some(&request), "Done", NotifyOptions::new().redirect("/people"))
            .unwrap()
            .unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[LOCATION], "/people");
        let flashed = request.flash.peek();
        assert_eq!(flashed.len(), 1);
        assert_eq!(flashed[0].message, "Done");
        let extra: Value = serde_json::from_str(&flashed[0].extra_tags).unwrap();
        assert_eq!(extra["redirect_url"], "/people");
        assert_eq!(extra["swap"], "none");
    }

    #[test]
    fn test_plain_request_without_redirect_returns_none() {
        let request = NotifyRequest::default();
        let outcome = notifier()
            .add_warning(Some(&request), "Careful", NotifyOptions::new())
            .unwrap();
        assert!(outcome.is_none());
        assert_eq!(request.flash.len(), 1);
    }

    #[test]
    fn test_missing_request_is_a_no_op() {
        assert!(
            notifier()
                .add_info(None, "nobody listening", NotifyOptions::new())
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_htmx_event_stream_accept_gets_single_frame() {
        let response = notifier()
            .add_info(Some(&htmx(Some("text/event-stream"))), "ping", NotifyOptions::new())
            .unwrap()
            .unwrap();
        assert_eq!(response.headers()[CONTENT_TYPE], "text/event-stream");
        assert_eq!(response.headers()[CACHE_CONTROL], "no-cache");
        assert_eq!(response.headers()["x-accel-buffering"], "no");
    }

    #[test]
    fn test_replace_form_retargets_form_fragment() {
        let response = notifier()
            .handle_validation_error(Some(&htmx(None)), "Name is required", None, None)
            .unwrap()
            .unwrap();
        assert_eq!(response.headers()["hx-retarget"], ".fragment--form");
        assert_eq!(response.headers()["hx-target"], ".fragment--form");
        assert_eq!(response.headers()["hx-swap"], "innerHTML");
        let payload = trigger(&response);
        assert_eq!(payload["showNotification"]["title"], "Validation Error");
        assert_eq!(payload["showNotification"]["level"], "error");
    }

    #[test]
    fn test_htmx_redirect() {
        let response = notifier()
            .add_success(Some(&htmx(None)), "Created", NotifyOptions::new().redirect("/people/1"))
            .unwrap()
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["hx-redirect"], "/people/1");
        assert!(response.headers().contains_key("hx-trigger"));
    }

    #[test]
    fn test_non_ascii_message_is_header_safe() {
        let response = notifier()
            .add_info(Some(&htmx(None)), "Gespeichert ✓", NotifyOptions::new())
            .unwrap()
            .unwrap();
        assert_eq!(trigger(&response)["showNotification"]["message"], "Gespeichert ✓");
    }

    #[test]
    fn test_get_notifications_decodes_flash() {
        let notifier = notifier();
        let request = NotifyRequest::default();
        notifier
            .add_error(Some(&request), "Broken", NotifyOptions::new().title("Oops"))
            .unwrap();
        request
            .flash
            .add(FlashMessage::new(NotificationLevel::Info, "bare", ""));

        let decoded = notifier.get_notifications(&request.flash);
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0]["title"], "Oops");
        assert_eq!(decoded[0]["level"], "error");
        assert_eq!(decoded[0]["source"], "system");
        assert_eq!(decoded[1]["source"], "flash");
        assert_eq!(decoded[1]["duration"], 5000);
        assert!(decoded[1]["id"].as_str().unwrap().starts_with("msg_"));
        assert!(request.flash.is_empty());
    }

    #[test]
    fn test_invalid_level_name() {
        let err = notifier()
            .send_notification(Some(&NotifyRequest::default()), "x", "loud", NotifyOptions::new())
            .unwrap_err();
        assert_eq!(err.message, "Invalid notification level: loud");
    }

    #[tokio::test]
    async fn test_broadcast_stores_for_offline_users() {
        let notifier = notifier();
        let ids = vec!["u-1".to_string()];
        let level = NotificationLevel::Warning;
        let sent = notifier.broadcast_notification("Maintenance", level, "Heads up", Some(&ids));
        assert_eq!(sent, 1);
        let stored = notifier.hub().store().get("u-1");
        assert_eq!(stored[0].title, "Heads up");
    }
}
