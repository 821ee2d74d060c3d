//! In-memory entity store.
//!
//! Rows live in a `Vec` behind a `tokio::sync::RwLock`. Every write takes
//! the write lock for its full duration, so upserts and atomic batches are
//! serialized with all other writes.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use pipeline_core::error::AppError;
use pipeline_core::result::AppResult;
use pipeline_core::traits::{Entity, EntityStore, Upserted, WriteOp, WriteOutcome};
use pipeline_core::types::sorting::compare_records;
use pipeline_core::types::{FilterField, PkKind, Query, Record};

use crate::keys::{merged, normalize, pick, pk_missing, pk_text};

/// Entity store backed by process memory.
#[derive(Debug)]
pub struct MemoryStore<E> {
    rows: RwLock<Vec<Record>>,
    next_id: AtomicI64,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Default for MemoryStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> MemoryStore<E> {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
            _entity: PhantomData,
        }
    }

    /// Assign a primary key when missing and validate the row.
    fn prepare(&self, mut data: Record) -> AppResult<(E, Record)> {
        let info = E::pk_info();
        if pk_missing::<E>(&data) {
            let value = match info.kind {
                PkKind::Id => Value::from(self.next_id.fetch_add(1, Ordering::SeqCst)),
                PkKind::Uuid => Value::String(Uuid::new_v4().to_string()),
            };
            data.insert(info.name.clone(), value);
        } else if info.kind == PkKind::Id {
            if let Some(id) = data.get(&info.name).and_then(Value::as_i64) {
                self.next_id.fetch_max(id + 1, Ordering::SeqCst);
            }
        }
        normalize::<E>(data)
    }

    fn insert_into(&self, rows: &mut Vec<Record>, data: Record) -> AppResult<E> {
        let (entity, record) = self.prepare(data)?;
        let pk = pk_text::<E>(&record)?;
        if rows.iter().any(|row| pk_text::<E>(row).is_ok_and(|existing| existing == pk)) {
            return Err(AppError::conflict(format!(
                "{} with primary key '{pk}' already exists",
                E::MODEL_NAME
            )));
        }
        rows.push(record);
        Ok(entity)
    }

    /// Stage every change first so a validation failure leaves `rows` intact.
    fn update_in(
        rows: &mut [Record],
        filters: &[FilterField],
        changes: &Record,
    ) -> AppResult<Vec<E>> {
        let mut staged = Vec::new();
        for (idx, row) in rows.iter().enumerate() {
            if filters.iter().all(|f| f.matches(row)) {
                let (entity, record) = normalize::<E>(merged(row, changes))?;
                staged.push((idx, record, entity));
            }
        }

        let mut updated = Vec::with_capacity(staged.len());
        for (idx, record, entity) in staged {
            rows[idx] = record;
            updated.push(entity);
        }
        Ok(updated)
    }

    fn delete_from(rows: &mut Vec<Record>, filters: &[FilterField]) -> u64 {
        let before = rows.len();
        rows.retain(|row| !filters.iter().all(|f| f.matches(row)));
        (before - rows.len()) as u64
    }

    fn apply_one(&self, rows: &mut Vec<Record>, write: WriteOp) -> AppResult<WriteOutcome<E>> {
        match write {
            WriteOp::Insert(data) => self.insert_into(rows, data).map(WriteOutcome::Inserted),
            WriteOp::Update { filters, changes } => Self::update_in(rows, &filters, &changes)
                .map(|updated| WriteOutcome::Updated(updated.into_iter().next())),
            WriteOp::Delete { filters } => {
                Ok(WriteOutcome::Deleted(Self::delete_from(rows, &filters)))
            }
        }
    }
}

#[async_trait]
impl<E: Entity> EntityStore<E> for MemoryStore<E> {
    async fn fetch(&self, query: &Query) -> AppResult<Vec<E>> {
        let rows = self.rows.read().await;
        let mut matched: Vec<&Record> = rows.iter().filter(|row| query.matches(row)).collect();
        if !query.ordering.is_empty() {
            matched.sort_by(|a, b| compare_records(a, b, &query.ordering));
        }

        matched
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|row| E::from_record(row.clone()))
            .collect()
    }

    async fn count(&self, query: &Query) -> AppResult<u64> {
        let rows = self.rows.read().await;
        Ok(rows.iter().filter(|row| query.matches(row)).count() as u64)
    }

    async fn insert(&self, data: Record) -> AppResult<E> {
        let mut rows = self.rows.write().await;
        self.insert_into(&mut rows, data)
    }

    async fn insert_many(&self, batch: Vec<Record>) -> AppResult<Vec<E>> {
        let mut rows = self.rows.write().await;
        let mut staged = rows.clone();
        let created = batch
            .into_iter()
            .map(|data| self.insert_into(&mut staged, data))
            .collect::<AppResult<Vec<E>>>()?;
        *rows = staged;
        Ok(created)
    }

    async fn update(&self, filters: &[FilterField], changes: &Record) -> AppResult<Vec<E>> {
        let mut rows = self.rows.write().await;
        Self::update_in(&mut rows, filters, changes)
    }

    async fn delete(&self, filters: &[FilterField]) -> AppResult<u64> {
        let mut rows = self.rows.write().await;
        Ok(Self::delete_from(&mut rows, filters))
    }

    async fn upsert(
        &self,
        match_on: &[FilterField],
        data: Record,
        update_fields: &[String],
    ) -> AppResult<Upserted<E>> {
        let mut rows = self.rows.write().await;

        let existing = if match_on.is_empty() {
            None
        } else {
            rows.iter()
                .position(|row| match_on.iter().all(|f| f.matches(row)))
        };

        match existing {
            Some(idx) => {
                let changes = pick(&data, update_fields);
                let (entity, record) = normalize::<E>(merged(&rows[idx], &changes))?;
                rows[idx] = record;
                debug!(model = E::MODEL_NAME, "Upsert updated existing row");
                Ok(Upserted { entity, created: false })
            }
            None => {
                let entity = self.insert_into(&mut rows, data)?;
                debug!(model = E::MODEL_NAME, "Upsert inserted new row");
                Ok(Upserted { entity, created: true })
            }
        }
    }

    async fn apply(
        &self,
        writes: Vec<WriteOp>,
        atomic: bool,
    ) -> Result<Vec<AppResult<WriteOutcome<E>>>, (usize, AppError)> {
        let mut rows = self.rows.write().await;

        if !atomic {
            return Ok(writes
                .into_iter()
                .map(|write| self.apply_one(&mut rows, write))
                .collect());
        }

        let mut staged = rows.clone();
        let mut outcomes = Vec::with_capacity(writes.len());
        for (idx, write) in writes.into_iter().enumerate() {
            match self.apply_one(&mut staged, write) {
                Ok(outcome) => outcomes.push(Ok(outcome)),
                Err(e) => {
                    debug!(model = E::MODEL_NAME, index = idx, "Atomic batch rolled back");
                    return Err((idx, e));
                }
            }
        }
        *rows = staged;
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline_core::types::SortField;
    use pipeline_entity::{Person, Tag};
    use serde_json::json;

    fn rec(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_insert_assigns_primary_keys() {
        let tags = MemoryStore::<Tag>::new();
        let a = tags.insert(rec(json!({"name": "Rust", "slug": "rust"}))).await.unwrap();
        let b = tags.insert(rec(json!({"name": "Go", "slug": "go"}))).await.unwrap();
        assert_eq!((a.id, b.id), (1, 2));

        let people = MemoryStore::<Person>::new();
        let p = people.insert(rec(json!({"name": "Ada"}))).await.unwrap();
        assert!(!p.uuid.is_nil());
    }

    #[tokio::test]
    async fn test_explicit_id_advances_sequence() {
        let tags = MemoryStore::<Tag>::new();
        tags.insert(rec(json!({"id": 10, "name": "a", "slug": "a"}))).await.unwrap();
        let next = tags.insert(rec(json!({"name": "b", "slug": "b"}))).await.unwrap();
        assert_eq!(next.id, 11);

        let dup = tags.insert(rec(json!({"id": 10, "name": "c", "slug": "c"}))).await;
        assert_eq!(dup.unwrap_err().kind, pipeline_core::ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_fetch_orders_and_slices() {
        let tags = MemoryStore::<Tag>::new();
        for name in ["b", "c", "a"] {
            tags.insert(rec(json!({"name": name, "slug": name}))).await.unwrap();
        }
        let query = Query::new().order_by([SortField::desc("name")]).offset(1).limit(1);
        let names: Vec<String> =
            tags.fetch(&query).await.unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["b"]);
        assert_eq!(tags.count(&query).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_invalid_update_leaves_rows_untouched() {
        let tags = MemoryStore::<Tag>::new();
        tags.insert(rec(json!({"name": "a", "slug": "a"}))).await.unwrap();
        let err = tags
            .update(&[FilterField::exact("id", 1)], &rec(json!({"usage_count": "many"})))
            .await
            .unwrap_err();
        assert_eq!(err.kind, pipeline_core::ErrorKind::Validation);
        let tag = tags.fetch_one(&[FilterField::exact("id", 1)]).await.unwrap().unwrap();
        assert_eq!(tag.usage_count, 0);
    }

    #[tokio::test]
    async fn test_upsert_updates_matching_row() {
        let people = MemoryStore::<Person>::new();
        let match_on = [FilterField::exact("email", "a@b.com")];
        let fields = vec!["name".to_string(), "email".to_string()];

        let first = people
            .upsert(&match_on, rec(json!({"email": "a@b.com", "name": "X"})), &fields)
            .await
            .unwrap();
        assert!(first.created);

        let second = people
            .upsert(&match_on, rec(json!({"email": "a@b.com", "name": "Y"})), &fields)
            .await
            .unwrap();
        assert!(!second.created);
        assert_eq!(second.entity.uuid, first.entity.uuid);
        assert_eq!(people.count(&Query::new()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_upserts_create_one_row() {
        let people = std::sync::Arc::new(MemoryStore::<Person>::new());
        let mut handles = Vec::new();
        for i in 0..8 {
            let people = people.clone();
            handles.push(tokio::spawn(async move {
                people
                    .upsert(
                        &[FilterField::exact("email", "same@example.com")],
                        rec(json!({"email": "same@example.com", "name": format!("n{i}")})),
                        &["name".to_string()],
                    )
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(people.count(&Query::new()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_atomic_apply_rolls_back() {
        let tags = MemoryStore::<Tag>::new();
        tags.insert(rec(json!({"name": "keep", "slug": "keep"}))).await.unwrap();

        let writes = vec![
            WriteOp::Insert(rec(json!({"name": "new", "slug": "new"}))),
            WriteOp::Delete { filters: vec![FilterField::exact("slug", "keep")] },
            WriteOp::Insert(rec(json!({"name": "broken"}))),
        ];
        let (idx, _) = tags.apply(writes, true).await.unwrap_err();
        assert_eq!(idx, 2);

        let all = tags.fetch(&Query::new()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].slug, "keep");
    }

    #[tokio::test]
    async fn test_non_atomic_apply_keeps_successes() {
        let tags = MemoryStore::<Tag>::new();
        let writes = vec![
            WriteOp::Insert(rec(json!({"name": "ok", "slug": "ok"}))),
            WriteOp::Insert(rec(json!({"name": "broken"}))),
        ];
        let results = tags.apply(writes, false).await.unwrap();
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert_eq!(tags.count(&Query::new()).await.unwrap(), 1);
    }
}
