//! PostgreSQL entity store.
//!
//! Every entity type shares the `records` table; rows are keyed by
//! `(model, pk)` and the entity itself lives in the `data` JSONB column.
//! Filters compile to `data ->> field` predicates.

use std::marker::PhantomData;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgConnection, PgPool, Postgres};
use sqlx::types::Json;
use sqlx::QueryBuilder;
use tracing::debug;
use uuid::Uuid;

use pipeline_core::error::{AppError, ErrorKind};
use pipeline_core::result::AppResult;
use pipeline_core::traits::{Entity, EntityStore, Upserted, WriteOp, WriteOutcome};
use pipeline_core::types::record::value_to_string;
use pipeline_core::types::{FilterField, FilterOp, PkKind, Query, Record};

use crate::keys::{merged, model_name, normalize, pick, pk_missing, pk_text};

/// Entity store backed by the PostgreSQL `records` table.
#[derive(Debug, Clone)]
pub struct PgStore<E> {
    pool: PgPool,
    _entity: PhantomData<fn() -> E>,
}

fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return AppError::conflict(format!("{context}: record already exists"));
            }
        }
        AppError::with_source(ErrorKind::Database, context, e)
    }
}

/// Escape `%`, `_` and `\` for use inside an ILIKE pattern.
fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &FilterField) {
    let field = filter.field.clone();
    match filter.op {
        FilterOp::Exact if filter.value.is_null() => {
            qb.push("(data ->> ").push_bind(field).push(") IS NULL");
        }
        FilterOp::Exact => {
            qb.push("(data ->> ")
                .push_bind(field)
                .push(") = ")
                .push_bind(value_to_string(&filter.value));
        }
        FilterOp::IExact => {
            qb.push("LOWER(data ->> ")
                .push_bind(field)
                .push(") = LOWER(")
                .push_bind(value_to_string(&filter.value))
                .push(")");
        }
        FilterOp::IContains | FilterOp::IStartsWith => {
            let needle = escape_like(&value_to_string(&filter.value));
            let pattern = if filter.op == FilterOp::IContains {
                format!("%{needle}%")
            } else {
                format!("{needle}%")
            };
            qb.push("(data ->> ").push_bind(field).push(") ILIKE ").push_bind(pattern);
        }
        FilterOp::In => {
            let values: Vec<String> = match &filter.value {
                Value::Array(items) => items.iter().map(value_to_string).collect(),
                _ => Vec::new(),
            };
            qb.push("(data ->> ").push_bind(field).push(") = ANY(").push_bind(values).push(")");
        }
        FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte => {
            let op = match filter.op {
                FilterOp::Gt => " > ",
                FilterOp::Gte => " >= ",
                FilterOp::Lt => " < ",
                _ => " <= ",
            };
            qb.push("(data -> ")
                .push_bind(field)
                .push(")")
                .push(op)
                .push_bind(Json(filter.value.clone()));
        }
        FilterOp::IsNull => {
            let want_null = filter.value.as_bool().unwrap_or(true);
            qb.push("(data ->> ")
                .push_bind(field)
                .push(if want_null { ") IS NULL" } else { ") IS NOT NULL" });
        }
    }
}

fn push_group(qb: &mut QueryBuilder<'_, Postgres>, filters: &[FilterField], joiner: &str) {
    qb.push("(");
    for (i, filter) in filters.iter().enumerate() {
        if i > 0 {
            qb.push(joiner);
        }
        push_filter(qb, filter);
    }
    qb.push(")");
}

fn push_predicate(qb: &mut QueryBuilder<'_, Postgres>, model: String, query: &Query) {
    qb.push(" WHERE model = ").push_bind(model);
    for filter in &query.filters {
        qb.push(" AND ");
        push_filter(qb, filter);
    }
    if !query.exclude.is_empty() {
        qb.push(" AND NOT ");
        push_group(qb, &query.exclude, " AND ");
    }
    if !query.any_of.is_empty() {
        qb.push(" AND ");
        push_group(qb, &query.any_of, " OR ");
    }
}

fn push_tail(qb: &mut QueryBuilder<'_, Postgres>, query: &Query) {
    qb.push(" ORDER BY ");
    for sort in &query.ordering {
        qb.push("data -> ")
            .push_bind(sort.field.clone())
            .push(" ")
            .push(sort.direction.as_sql())
            .push(", ");
    }
    qb.push("seq");
    if let Some(limit) = query.limit {
        qb.push(" LIMIT ").push_bind(limit as i64);
    }
    if let Some(offset) = query.offset {
        qb.push(" OFFSET ").push_bind(offset as i64);
    }
}

impl<E: Entity> PgStore<E> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _entity: PhantomData,
        }
    }

    fn decode(rows: Vec<Value>) -> AppResult<Vec<E>> {
        rows.into_iter()
            .map(|value| Ok(serde_json::from_value(value)?))
            .collect()
    }

    async fn select(
        conn: &mut PgConnection,
        query: &Query,
        lock: bool,
    ) -> AppResult<Vec<(String, Record)>> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT pk, data FROM records");
        push_predicate(&mut qb, model_name::<E>(), query);
        push_tail(&mut qb, query);
        if lock {
            qb.push(" FOR UPDATE");
        }

        let rows: Vec<(String, Json<Value>)> = qb
            .build_query_as()
            .fetch_all(&mut *conn)
            .await
            .map_err(db_error("Failed to select records"))?;

        Ok(rows
            .into_iter()
            .filter_map(|(pk, Json(data))| match data {
                Value::Object(map) => Some((pk, map)),
                _ => None,
            })
            .collect())
    }

    async fn insert_row(conn: &mut PgConnection, mut data: Record) -> AppResult<E> {
        let info = E::pk_info();
        if pk_missing::<E>(&data) {
            let value = match info.kind {
                PkKind::Id => {
                    let next: i64 = sqlx::query_scalar("SELECT nextval('record_id_seq')")
                        .fetch_one(&mut *conn)
                        .await
                        .map_err(db_error("Failed to allocate record id"))?;
                    Value::from(next)
                }
                PkKind::Uuid => Value::String(Uuid::new_v4().to_string()),
            };
            data.insert(info.name.clone(), value);
        }

        let (entity, record) = normalize::<E>(data)?;
        let pk = pk_text::<E>(&record)?;
        sqlx::query("INSERT INTO records (model, pk, data) VALUES ($1, $2, $3)")
            .bind(model_name::<E>())
            .bind(pk)
            .bind(Json(Value::Object(record)))
            .execute(&mut *conn)
            .await
            .map_err(db_error("Failed to insert record"))?;
        Ok(entity)
    }

    async fn update_rows(
        conn: &mut PgConnection,
        filters: &[FilterField],
        changes: &Record,
    ) -> AppResult<Vec<E>> {
        let query = Query::new().filters(filters.iter().cloned());
        let rows = Self::select(conn, &query, true).await?;

        let mut updated = Vec::with_capacity(rows.len());
        for (old_pk, row) in rows {
            let (entity, record) = normalize::<E>(merged(&row, changes))?;
            Self::write_row(conn, &old_pk, record).await?;
            updated.push(entity);
        }
        Ok(updated)
    }

    async fn write_row(conn: &mut PgConnection, old_pk: &str, record: Record) -> AppResult<()> {
        let new_pk = pk_text::<E>(&record)?;
        sqlx::query(
            "UPDATE records SET pk = $1, data = $2, updated_at = now() \
             WHERE model = $3 AND pk = $4",
        )
        .bind(new_pk)
        .bind(Json(Value::Object(record)))
        .bind(model_name::<E>())
        .bind(old_pk)
        .execute(&mut *conn)
        .await
        .map_err(db_error("Failed to update record"))?;
        Ok(())
    }

    async fn delete_rows(conn: &mut PgConnection, filters: &[FilterField]) -> AppResult<u64> {
        let query = Query::new().filters(filters.iter().cloned());
        let mut qb = QueryBuilder::<Postgres>::new("DELETE FROM records");
        push_predicate(&mut qb, model_name::<E>(), &query);
        let result = qb
            .build()
            .execute(&mut *conn)
            .await
            .map_err(db_error("Failed to delete records"))?;
        Ok(result.rows_affected())
    }

    async fn apply_one(conn: &mut PgConnection, write: WriteOp) -> AppResult<WriteOutcome<E>> {
        match write {
            WriteOp::Insert(data) => Self::insert_row(conn, data).await.map(WriteOutcome::Inserted),
            WriteOp::Update { filters, changes } => Self::update_rows(conn, &filters, &changes)
                .await
                .map(|rows| WriteOutcome::Updated(rows.into_iter().next())),
            WriteOp::Delete { filters } => Self::delete_rows(conn, &filters)
                .await
                .map(WriteOutcome::Deleted),
        }
    }

    async fn begin(&self) -> AppResult<sqlx::Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))
    }
}

async fn commit(tx: sqlx::Transaction<'static, Postgres>) -> AppResult<()> {
    tx.commit().await.map_err(db_error("Failed to commit transaction"))
}

#[async_trait]
impl<E: Entity> EntityStore<E> for PgStore<E> {
    async fn fetch(&self, query: &Query) -> AppResult<Vec<E>> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT data FROM records");
        push_predicate(&mut qb, model_name::<E>(), query);
        push_tail(&mut qb, query);

        let rows: Vec<Value> = qb
            .build_query_scalar()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to fetch records"))?;
        Self::decode(rows)
    }

    async fn count(&self, query: &Query) -> AppResult<u64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM records");
        push_predicate(&mut qb, model_name::<E>(), query);

        let total: i64 = qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("Failed to count records"))?;
        Ok(total as u64)
    }

    async fn insert(&self, data: Record) -> AppResult<E> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(db_error("Failed to acquire connection"))?;
        Self::insert_row(&mut conn, data).await
    }

    async fn insert_many(&self, rows: Vec<Record>) -> AppResult<Vec<E>> {
        let mut tx = self.begin().await?;
        let mut created = Vec::with_capacity(rows.len());
        for data in rows {
            created.push(Self::insert_row(&mut tx, data).await?);
        }
        commit(tx).await?;
        Ok(created)
    }

    async fn update(&self, filters: &[FilterField], changes: &Record) -> AppResult<Vec<E>> {
        let mut tx = self.begin().await?;
        let updated = Self::update_rows(&mut tx, filters, changes).await?;
        commit(tx).await?;
        Ok(updated)
    }

    async fn delete(&self, filters: &[FilterField]) -> AppResult<u64> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(db_error("Failed to acquire connection"))?;
        Self::delete_rows(&mut conn, filters).await
    }

    async fn upsert(
        &self,
        match_on: &[FilterField],
        data: Record,
        update_fields: &[String],
    ) -> AppResult<Upserted<E>> {
        let mut tx = self.begin().await?;

        // Serialize concurrent upserts on the same match key.
        let lock_key = format!("{}:{}", model_name::<E>(), serde_json::to_string(match_on)?);
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(lock_key)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to lock upsert key"))?;

        let existing = if match_on.is_empty() {
            None
        } else {
            let query = Query::new().filters(match_on.iter().cloned()).limit(1);
            Self::select(&mut tx, &query, true).await?.into_iter().next()
        };

        let upserted = match existing {
            Some((pk, row)) => {
                let (entity, record) = normalize::<E>(merged(&row, &pick(&data, update_fields)))?;
                Self::write_row(&mut tx, &pk, record).await?;
                Upserted { entity, created: false }
            }
            None => Upserted {
                entity: Self::insert_row(&mut tx, data).await?,
                created: true,
            },
        };

        commit(tx).await?;
        debug!(model = E::MODEL_NAME, created = upserted.created, "Upsert committed");
        Ok(upserted)
    }

    async fn apply(
        &self,
        writes: Vec<WriteOp>,
        atomic: bool,
    ) -> Result<Vec<AppResult<WriteOutcome<E>>>, (usize, AppError)> {
        if atomic {
            let mut tx = self.begin().await.map_err(|e| (0, e))?;
            let mut outcomes = Vec::with_capacity(writes.len());
            for (idx, write) in writes.into_iter().enumerate() {
                match Self::apply_one(&mut tx, write).await {
                    Ok(outcome) => outcomes.push(Ok(outcome)),
                    // Dropping the transaction rolls it back.
                    Err(e) => return Err((idx, e)),
                }
            }
            commit(tx).await.map_err(|e| (outcomes.len(), e))?;
            return Ok(outcomes);
        }

        let mut outcomes = Vec::with_capacity(writes.len());
        for write in writes {
            let outcome: AppResult<WriteOutcome<E>> = async {
                let mut tx = self.begin().await?;
                let outcome = Self::apply_one(&mut tx, write).await?;
                commit(tx).await?;
                Ok(outcome)
            }
            .await;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }
}
