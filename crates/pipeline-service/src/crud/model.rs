//! Basic model service: get, create, update, delete and list.

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use pipeline_core::error::AppError;
use pipeline_core::result::AppResult;
use pipeline_core::traits::{Entity, Service};
use pipeline_core::types::{FilterField, OffsetPage, PK_ALIASES, Query, Record, SortField};

use crate::args;
use crate::manager::base::{BaseManager, filters_for};

/// Default page size of `list`.
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Generic service over one entity type.
#[derive(Debug, Clone)]
pub struct ModelService<E: Entity> {
    name: String,
    manager: BaseManager<E>,
}

impl<E: Entity> ModelService<E> {
    pub fn new(name: impl Into<String>, manager: BaseManager<E>) -> Self {
        Self {
            name: name.into(),
            manager,
        }
    }

    pub fn manager(&self) -> &BaseManager<E> {
        &self.manager
    }

    /// First row matching the keyword filters.
    pub async fn get(&self, filters: &Record) -> AppResult<Option<E>> {
        self.manager.store().fetch_one(&filters_for::<E>(filters)).await
    }

    pub async fn create(&self, data: Record) -> AppResult<E> {
        let entity = self.manager.store().insert(data).await?;
        info!(model = %E::MODEL_NAME, "Created {}", entity.display());
        Ok(entity)
    }

    /// Apply `changes` to the row with primary key `pk`.
    pub async fn update(&self, pk: &Value, changes: &Record) -> AppResult<Option<E>> {
        let filters = [FilterField::exact(E::pk_info().name, pk.clone())];
        Ok(self.manager.store().update(&filters, changes).await?.into_iter().next())
    }

    /// Delete the row with primary key `pk`. Returns whether a row was
    /// removed.
    pub async fn delete(&self, pk: &Value) -> AppResult<bool> {
        let filters = [FilterField::exact(E::pk_info().name, pk.clone())];
        Ok(self.manager.store().delete(&filters).await? > 0)
    }

    pub async fn list(
        &self,
        filters: &Record,
        ordering: &[String],
        limit: usize,
        offset: usize,
    ) -> AppResult<OffsetPage<E>> {
        let query = Query::new()
            .filters(filters_for::<E>(filters))
            .order_by(SortField::parse_all(ordering));
        let total = self.manager.store().count(&query).await?;
        let results = self
            .manager
            .store()
            .fetch(&query.offset(offset).limit(limit))
            .await?;
        Ok(OffsetPage::new(results, total, limit, offset))
    }
}

/// Primary key passed as `pk`, the pk name or its alias.
pub(crate) fn pk_arg<E: Entity>(args: &Record) -> Option<Value> {
    let info = E::pk_info();
    [info.name.as_str(), "pk", info.alias()]
        .into_iter()
        .find_map(|key| args::opt_value(args, key))
}

/// Drop `pk`, `id`, `uuid` and the real pk name.
pub(crate) fn strip_pk_keys<E: Entity>(mut data: Record) -> Record {
    let info = E::pk_info();
    data.retain(|key, _| !info.is_pk_key(key) && !PK_ALIASES.contains(&key.as_str()));
    data
}

pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> AppResult<Value> {
    Ok(serde_json::to_value(value)?)
}

#[async_trait]
impl<E: Entity> Service for ModelService<E> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, operation: &str, args: Record) -> AppResult<Value> {
        match operation {
            "get" => to_json(&self.get(&args).await?),
            "create" => to_json(&self.create(args).await?),
            "update" => {
                let pk = pk_arg::<E>(&args)
                    .ok_or_else(|| AppError::validation("Missing identifier"))?;
                to_json(&self.update(&pk, &strip_pk_keys::<E>(args)).await?)
            }
            "delete" => {
                let pk = pk_arg::<E>(&args)
                    .ok_or_else(|| AppError::validation("Missing identifier"))?;
                to_json(&self.delete(&pk).await?)
            }
            "list" => {
                let filters = args::record(&args, "filters")?;
                let ordering = args::strings(&args, "ordering")?;
                let limit = args::opt_usize(&args, "limit").unwrap_or(DEFAULT_LIST_LIMIT);
                let offset = args::opt_usize(&args, "offset").unwrap_or(0);
                to_json(&self.list(&filters, &ordering, limit, offset).await?)
            }
            other => Err(AppError::validation(format!("Unknown operation: {other}"))),
        }
    }
}
