//! `CurrentUser` extractor: the user behind an optional action token.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use pipeline_core::error::AppError;

use crate::error::ApiError;
use crate::state::AppState;

/// User id from a `read` token in `Authorization: Bearer` or `?token=`.
///
/// No token means an anonymous request. A token that fails validation is
/// rejected with 401.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurrentUser(pub Option<String>);

impl CurrentUser {
    pub fn id(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    let header = parts
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = header {
        return Some(token.to_string());
    }

    parts.uri.query().and_then(|query| {
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "token")
            .map(|(_, value)| value.into_owned())
            .filter(|t| !t.is_empty())
    })
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts) else {
            return Ok(Self(None));
        };

        let validation = state.tokens.validate(&token, "read", None).await?;
        if !validation.valid {
            return Err(AppError::authentication(validation.error_message()).into());
        }
        Ok(Self(validation.user_id))
    }
}
