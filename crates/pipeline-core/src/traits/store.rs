//! Entity store trait: the persistence seam under managers and services.

use async_trait::async_trait;

use crate::result::AppResult;
use crate::traits::entity::Entity;
use crate::types::filter::FilterField;
use crate::types::query::Query;
use crate::types::record::Record;

/// Result of an upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct Upserted<E> {
    pub entity: E,
    /// `true` when no row matched and a new one was inserted.
    pub created: bool,
}

/// One write inside a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Insert(Record),
    Update {
        filters: Vec<FilterField>,
        changes: Record,
    },
    Delete {
        filters: Vec<FilterField>,
    },
}

/// Result of one batch write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome<E> {
    Inserted(E),
    /// The first updated row, `None` when nothing matched.
    Updated(Option<E>),
    /// Number of deleted rows.
    Deleted(u64),
}

/// Persistence for one entity type.
///
/// The primary key is assigned on insert when the record does not carry
/// one. Every write validates the resulting record by converting it back
/// into `E`.
#[async_trait]
pub trait EntityStore<E: Entity>: Send + Sync + 'static {
    /// Rows matching the query, ordered and sliced.
    async fn fetch(&self, query: &Query) -> AppResult<Vec<E>>;

    /// Number of rows matching the query predicate. Ordering and slicing
    /// are ignored.
    async fn count(&self, query: &Query) -> AppResult<u64>;

    async fn insert(&self, data: Record) -> AppResult<E>;

    /// Insert every row or none of them.
    async fn insert_many(&self, rows: Vec<Record>) -> AppResult<Vec<E>>;

    /// Apply `changes` to every matching row and return the updated rows.
    async fn update(&self, filters: &[FilterField], changes: &Record) -> AppResult<Vec<E>>;

    /// Delete matching rows and return how many were removed.
    async fn delete(&self, filters: &[FilterField]) -> AppResult<u64>;

    /// Atomically update the first row matching `match_on` with the
    /// `update_fields` of `data`, or insert `data` when nothing matches.
    async fn upsert(
        &self,
        match_on: &[FilterField],
        data: Record,
        update_fields: &[String],
    ) -> AppResult<Upserted<E>>;

    /// Apply a list of writes.
    ///
    /// With `atomic`, the first failure rolls back the whole batch and is
    /// returned as `Err` together with the index of the failing write.
    /// Without it, each write stands alone and carries its own result.
    async fn apply(
        &self,
        writes: Vec<WriteOp>,
        atomic: bool,
    ) -> Result<Vec<AppResult<WriteOutcome<E>>>, (usize, crate::AppError)>;

    /// First row matching the filters.
    async fn fetch_one(&self, filters: &[FilterField]) -> AppResult<Option<E>> {
        let query = Query::new().filters(filters.iter().cloned()).limit(1);
        Ok(self.fetch(&query).await?.into_iter().next())
    }

    async fn exists(&self, filters: &[FilterField]) -> AppResult<bool> {
        let query = Query::new().filters(filters.iter().cloned());
        Ok(self.count(&query).await? > 0)
    }
}
