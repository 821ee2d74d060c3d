//! HTTP request handlers, one module per route group.

pub mod health;
pub mod list;
pub mod notification;
pub mod service;
pub mod token;

use axum::body::Bytes;
use serde::de::DeserializeOwned;
use validator::Validate;

use pipeline_core::error::AppError;
use pipeline_core::result::AppResult;

use crate::dto::first_validation_message;

/// Parse and validate a JSON body. Malformed JSON and failed validation
/// are both 400s.
pub(crate) fn parse_body<T: DeserializeOwned + Validate>(body: &Bytes) -> AppResult<T> {
    let value: T = serde_json::from_slice(body).map_err(|_| AppError::validation("Invalid JSON"))?;
    value
        .validate()
        .map_err(|errors| AppError::validation(first_validation_message(&errors)))?;
    Ok(value)
}
