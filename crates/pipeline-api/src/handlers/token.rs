//! Action token handlers.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;

use pipeline_auth::{IssuedToken, RevokedToken};

use super::parse_body;
use crate::dto::request::{IssueTokenRequest, RevokeTokenRequest};
use crate::error::ApiError;
use crate::state::AppState;

/// POST /tokens
pub async fn issue(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<IssuedToken>, ApiError> {
    let req: IssueTokenRequest = parse_body(&body)?;
    let issued = state
        .tokens
        .generate(&req.user_id, &req.action, req.expires_in, req.metadata)?;
    Ok(Json(issued))
}

/// POST /tokens/revoke
pub async fn revoke(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<RevokedToken>, ApiError> {
    let req: RevokeTokenRequest = parse_body(&body)?;
    Ok(Json(state.tokens.revoke(&req.token).await?))
}
