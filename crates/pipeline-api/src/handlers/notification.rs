//! Notification handlers: the SSE stream, sending and pending lists.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use tracing::info;

use pipeline_realtime::NotificationLevel;

use super::parse_body;
use crate::dto::request::{NotifyQuery, SendNotificationRequest};
use crate::dto::response::{NotifyResponse, PendingResponse};
use crate::error::ApiError;
use crate::notify::{NotifyOptions, NotifyRequest};
use crate::state::AppState;

fn flashed() -> Response {
    Json(NotifyResponse {
        success: true,
        delivered: "flash".to_string(),
        recipients: None,
    })
    .into_response()
}

/// GET /notifications/stream
pub async fn stream(State(state): State<AppState>, request: NotifyRequest) -> Response {
    info!(user_id = ?request.user_id, "Opening notification stream");
    state.notifier.send_notification_stream(&request)
}

/// GET /notifications
///
/// Sends `?message=` through [`Notifier`](crate::notify::Notifier). Without
/// a message, or when the client only accepts an event stream, opens the
/// stream instead.
pub async fn notify(
    State(state): State<AppState>,
    request: NotifyRequest,
    Query(query): Query<NotifyQuery>,
) -> Result<Response, ApiError> {
    let wants_stream = request.htmx.accept.as_deref() == Some("text/event-stream");
    let message = query.message.as_deref().filter(|m| !m.is_empty());

    let Some(message) = message.filter(|_| !wants_stream) else {
        return Ok(state.notifier.send_notification_stream(&request));
    };

    let options = NotifyOptions::new()
        .title(query.title.clone().unwrap_or_default())
        .redirect_opt(query.redirect.clone());
    let response = state
        .notifier
        .send_notification(Some(&request), message, &query.level, options)?;
    Ok(response.unwrap_or_else(flashed))
}

/// POST /notifications
pub async fn send(
    State(state): State<AppState>,
    request: NotifyRequest,
    body: Bytes,
) -> Result<Response, ApiError> {
    let req: SendNotificationRequest = parse_body(&body)?;

    if let Some(user_ids) = req.recipients() {
        let level: NotificationLevel = req.level.parse()?;
        let recipients = state
            .notifier
            .broadcast_notification(&req.message, level, &req.title, Some(&user_ids));
        return Ok(Json(NotifyResponse {
            success: true,
            delivered: "broadcast".to_string(),
            recipients: Some(recipients),
        })
        .into_response());
    }

    let options = NotifyOptions::new().title(req.title.clone());
    let response = state
        .notifier
        .send_notification(Some(&request), &req.message, &req.level, options)?;
    Ok(response.unwrap_or_else(flashed))
}

/// GET /notifications/pending
///
/// Drains the caller's stored notifications and flash messages.
pub async fn pending(
    State(state): State<AppState>,
    request: NotifyRequest,
) -> Json<PendingResponse> {
    let notifications = request
        .user_id
        .as_deref()
        .map(|uid| state.hub.store().pop(uid))
        .unwrap_or_default()
        .iter()
        .map(|n| n.to_dict())
        .collect();

    Json(PendingResponse {
        notifications,
        messages: state.notifier.get_notifications(&request.flash),
    })
}
