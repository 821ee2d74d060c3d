//! Batched create/update/delete operations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use pipeline_core::result::AppResult;
use pipeline_core::traits::{Entity, Service, WriteOp, WriteOutcome};
use pipeline_core::types::{FilterField, Record};

use super::model::{strip_pk_keys, to_json};
use super::service::CrudService;
use crate::args;

const ROLLED_BACK: &str = "Rolled back";

/// One entry of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOperation {
    /// `create`, `update` or `delete`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Record,
}

impl BatchOperation {
    pub fn new(kind: impl Into<String>, data: Record) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }
}

/// Aggregate result of [`BatchCrudService::execute_batch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_operations: usize,
    pub successful: usize,
    pub failed: usize,
    /// Per-operation results, in input order: `{success, type, object}` or
    /// `{success: false, error}`.
    pub results: Vec<Value>,
}

impl BatchSummary {
    fn from_results(results: Vec<Value>) -> Self {
        let successful = results
            .iter()
            .filter(|r| r["success"].as_bool().unwrap_or(false))
            .count();
        Self {
            total_operations: results.len(),
            successful,
            failed: results.len() - successful,
            results,
        }
    }
}

fn failure(error: impl Into<String>) -> Value {
    json!({"success": false, "error": error.into()})
}

/// Runs lists of writes through a [`CrudService`].
#[derive(Debug, Clone)]
pub struct BatchCrudService<E: Entity> {
    crud: CrudService<E>,
}

impl<E: Entity> BatchCrudService<E> {
    pub fn new(crud: CrudService<E>) -> Self {
        Self { crud }
    }

    pub fn crud(&self) -> &CrudService<E> {
        &self.crud
    }

    fn plan(&self, op: &BatchOperation) -> Result<WriteOp, String> {
        let pk_filter = |data: &Record| {
            self.crud
                .pk_value_from_data(data)
                .map(|pk| vec![FilterField::exact(self.crud.pk_info().name.clone(), pk)])
                .ok_or_else(|| "Missing identifier".to_string())
        };
        match op.kind.as_str() {
            "create" => Ok(WriteOp::Insert(self.crud.normalize_pk_kwargs(op.data.clone()))),
            "update" => Ok(WriteOp::Update {
                filters: pk_filter(&op.data)?,
                changes: strip_pk_keys::<E>(op.data.clone()),
            }),
            "delete" => Ok(WriteOp::Delete {
                filters: pk_filter(&op.data)?,
            }),
            other => Err(format!("Unknown operation type: {other}")),
        }
    }

    fn report(kind: &str, outcome: AppResult<WriteOutcome<E>>) -> Value {
        let object = match outcome {
            Ok(WriteOutcome::Inserted(entity)) => json!(entity),
            Ok(WriteOutcome::Updated(entity)) => json!(entity),
            Ok(WriteOutcome::Deleted(0)) => return failure("Object not found"),
            Ok(WriteOutcome::Deleted(_)) => Value::Null,
            Err(e) => return failure(e.message),
        };
        json!({"success": true, "type": kind, "object": object})
    }

    /// Execute `operations` in order.
    ///
    /// Without `transaction_required` every operation stands alone. With it
    /// the batch is all or nothing: the first error rolls every write back,
    /// the failing operation reports its error and all others report
    /// `Rolled back`. A delete that matches nothing is reported as failed
    /// but does not abort the batch.
    pub async fn execute_batch(
        &self,
        operations: Vec<BatchOperation>,
        transaction_required: bool,
    ) -> AppResult<BatchSummary> {
        let plans: Vec<Result<WriteOp, String>> =
            operations.iter().map(|op| self.plan(op)).collect();

        if transaction_required {
            if let Some(bad) = plans.iter().position(Result::is_err) {
                let results = plans
                    .into_iter()
                    .enumerate()
                    .map(|(i, plan)| match plan {
                        Err(e) if i == bad => failure(e),
                        _ => failure(ROLLED_BACK),
                    })
                    .collect();
                warn!(model = %E::MODEL_NAME, index = bad, "Batch rejected before any write");
                return Ok(BatchSummary::from_results(results));
            }
        }

        // Valid writes go to the store; planning errors keep their slot.
        let mut slots = Vec::with_capacity(plans.len());
        let mut writes = Vec::new();
        for plan in plans {
            match plan {
                Ok(write) => {
                    slots.push(Ok(writes.len()));
                    writes.push(write);
                }
                Err(e) => slots.push(Err(e)),
            }
        }

        let store = self.crud.model().manager().store();
        let outcomes = match store.apply(writes, transaction_required).await {
            Ok(outcomes) => outcomes,
            Err((index, err)) => {
                warn!(model = %E::MODEL_NAME, index, "Batch rolled back: {}", err.message);
                let results = (0..operations.len())
                    .map(|i| {
                        if i == index {
                            failure(err.message.clone())
                        } else {
                            failure(ROLLED_BACK)
                        }
                    })
                    .collect();
                return Ok(BatchSummary::from_results(results));
            }
        };

        let mut outcomes: Vec<Option<AppResult<WriteOutcome<E>>>> =
            outcomes.into_iter().map(Some).collect();
        let results: Vec<Value> = slots
            .into_iter()
            .zip(&operations)
            .map(|(slot, op)| match slot {
                Ok(i) => match outcomes.get_mut(i).and_then(Option::take) {
                    Some(outcome) => Self::report(&op.kind, outcome),
                    None => failure("Missing write result"),
                },
                Err(e) => failure(e),
            })
            .collect();

        let summary = BatchSummary::from_results(results);
        if summary.successful > 0 {
            self.crud.invalidate_cache().await;
        }
        info!(
            model = %E::MODEL_NAME,
            total = summary.total_operations,
            successful = summary.successful,
            failed = summary.failed,
            "Executed batch"
        );
        Ok(summary)
    }
}

#[async_trait]
impl<E: Entity> Service for BatchCrudService<E> {
    fn name(&self) -> &str {
        self.crud.name()
    }

    async fn execute(&self, operation: &str, args: Record) -> AppResult<Value> {
        match operation {
            "execute_batch" => {
                let operations: Vec<BatchOperation> = args::required(&args, "operations")?;
                let transaction_required: Option<bool> =
                    args::typed(&args, "transaction_required")?;
                to_json(
                    &self
                        .execute_batch(operations, transaction_required.unwrap_or(false))
                        .await?,
                )
            }
            other => self.crud.execute(other, args).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pipeline_database::MemoryStore;
    use pipeline_entity::Tag;

    use super::*;
    use crate::manager::BaseManager;

    fn rec(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    async fn service_with_tag() -> (BatchCrudService<Tag>, Tag) {
        let crud = CrudService::new("tags", BaseManager::new(Arc::new(MemoryStore::<Tag>::new())));
        let tag = crud
            .model()
            .create(rec(json!({"name": "Rust", "slug": "rust"})))
            .await
            .unwrap();
        (BatchCrudService::new(crud), tag)
    }

    async fn count(svc: &BatchCrudService<Tag>) -> u64 {
        svc.crud().model().manager().count_by(&Record::new()).await.unwrap()
    }

    #[tokio::test]
    async fn test_independent_batch_reports_each_operation() {
        let (svc, tag) = service_with_tag().await;
        let summary = svc
            .execute_batch(
                vec![
                    BatchOperation::new("create", rec(json!({"name": "Go", "slug": "go"}))),
                    BatchOperation::new("update", rec(json!({"id": tag.id, "name": "Rust 2"}))),
                    BatchOperation::new("update", rec(json!({"name": "no id"}))),
                    BatchOperation::new("merge", Record::new()),
                    BatchOperation::new("delete", rec(json!({"id": 999}))),
                ],
                false,
            )
            .await
            .unwrap();

        assert_eq!(summary.total_operations, 5);
        assert_eq!(summary.successful, 2);
        assert_eq!(summary.failed, 3);
        assert_eq!(summary.results[0]["type"], "create");
        assert_eq!(summary.results[1]["object"]["name"], "Rust 2");
        assert_eq!(summary.results[2]["error"], "Missing identifier");
        assert_eq!(summary.results[3]["error"], "Unknown operation type: merge");
        assert_eq!(summary.results[4]["success"], false);
        assert_eq!(count(&svc).await, 2);
    }

    #[tokio::test]
    async fn test_transactional_batch_rolls_back_on_error() {
        let (svc, tag) = service_with_tag().await;
        let summary = svc
            .execute_batch(
                vec![
                    BatchOperation::new("create", rec(json!({"name": "Go", "slug": "go"}))),
                    // Missing the required `slug`.
                    BatchOperation::new("create", rec(json!({"name": "Broken"}))),
                    BatchOperation::new("delete", rec(json!({"id": tag.id}))),
                ],
                true,
            )
            .await
            .unwrap();

        assert_eq!(summary.successful, 0);
        assert_eq!(summary.failed, 3);
        assert_eq!(summary.results[0]["error"], "Rolled back");
        assert_ne!(summary.results[1]["error"], "Rolled back");
        assert_eq!(summary.results[2]["error"], "Rolled back");
        assert_eq!(count(&svc).await, 1);
    }

    #[tokio::test]
    async fn test_transactional_batch_rejects_bad_plan_without_writing() {
        let (svc, _) = service_with_tag().await;
        let summary = svc
            .execute_batch(
                vec![
                    BatchOperation::new("create", rec(json!({"name": "Go", "slug": "go"}))),
                    BatchOperation::new("delete", Record::new()),
                ],
                true,
            )
            .await
            .unwrap();
        assert_eq!(summary.results[0]["error"], "Rolled back");
        assert_eq!(summary.results[1]["error"], "Missing identifier");
        assert_eq!(count(&svc).await, 1);
    }

    #[tokio::test]
    async fn test_transactional_batch_commits() {
        let (svc, tag) = service_with_tag().await;
        let out = svc
            .run(
                "execute_batch",
                rec(json!({
                    "operations": [
                        {"type": "create", "data": {"name": "Go", "slug": "go"}},
                        {"type": "delete", "data": {"uuid": tag.id}},
                    ],
                    "transaction_required": true,
                })),
            )
            .await
            .unwrap();
        assert_eq!(out["successful"], 2);
        assert_eq!(count(&svc).await, 1);
    }
}
