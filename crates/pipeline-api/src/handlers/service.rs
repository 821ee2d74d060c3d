//! Generic service dispatch through the registry.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use serde_json::Value;
use tracing::debug;

use pipeline_core::error::AppError;
use pipeline_core::types::Record;

use crate::error::ApiError;
use crate::state::AppState;

/// GET /services
pub async fn list_services(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.services.names())
}

/// POST /services/{name}/{operation}
///
/// The body is the keyword map of the operation; an empty body means no
/// arguments.
pub async fn run_operation(
    State(state): State<AppState>,
    Path((name, operation)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let service = state
        .services
        .get(&name)
        .ok_or_else(|| AppError::not_found(format!("Service not found: {name}")))?;

    let args: Record = if body.iter().all(u8::is_ascii_whitespace) {
        Record::new()
    } else {
        serde_json::from_slice(&body)
            .map_err(|_| AppError::validation("Request body must be a JSON object"))?
    };

    debug!(service = %name, operation = %operation, "Dispatching service operation");
    Ok(Json(service.run(&operation, args).await?))
}
