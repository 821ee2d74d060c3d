//! Model services: plain CRUD, bulk and upsert operations, and batches.

pub mod batch;
pub mod model;
pub mod service;

pub use batch::{BatchCrudService, BatchOperation, BatchSummary};
pub use model::ModelService;
pub use service::CrudService;

use serde::{Deserialize, Serialize};

/// Result of a write: whether it succeeded, what it produced and a message
/// for the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationOutcome<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<T>,
    pub message: String,
}

impl<T> OperationOutcome<T> {
    pub fn ok(value: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            value: Some(value),
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            value: None,
            message: message.into(),
        }
    }
}
