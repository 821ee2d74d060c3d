//! `NotifyRequest` extractor.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::ApiError;
use crate::extractors::{CurrentUser, HtmxRequest};
use crate::middleware::flash::Flash;
use crate::state::AppState;

/// What [`Notifier`](super::Notifier) needs to know about the request it
/// answers.
#[derive(Debug, Clone, Default)]
pub struct NotifyRequest {
    pub htmx: HtmxRequest,
    pub flash: Flash,
    pub user_id: Option<String>,
}

impl NotifyRequest {
    pub fn new(htmx: HtmxRequest, flash: Flash, user_id: Option<String>) -> Self {
        Self { htmx, flash, user_id }
    }
}

impl FromRequestParts<AppState> for NotifyRequest {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let htmx = HtmxRequest::from_headers(&parts.headers);
        let flash = parts.extensions.get::<Flash>().cloned().unwrap_or_default();
        let CurrentUser(user_id) = CurrentUser::from_request_parts(parts, state).await?;
        Ok(Self { htmx, flash, user_id })
    }
}
