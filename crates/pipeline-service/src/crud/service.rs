//! CRUD service with primary-key normalization, bulk writes and upserts.
//!
//! Callers may address the primary key as `pk`, `id` or `uuid`; the
//! service maps those onto the entity's real pk field so that integer and
//! UUID keyed entities are used the same way.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, info};

use pipeline_core::error::AppError;
use pipeline_core::result::AppResult;
use pipeline_core::traits::{Entity, Service, WriteOp, WriteOutcome};
use pipeline_core::types::{FilterField, PkInfo, Record};

use pipeline_cache::ModelCache;

use super::OperationOutcome;
use super::model::{ModelService, pk_arg, strip_pk_keys, to_json};
use crate::args;
use crate::manager::base::{BaseManager, filters_for, normalize_pk_keys};

/// Rows written per store call in bulk operations.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// CRUD operations over one entity type, optionally keeping a
/// [`ModelCache`] in sync.
#[derive(Debug, Clone)]
pub struct CrudService<E: Entity> {
    model: ModelService<E>,
    pk: PkInfo,
    cache: Option<ModelCache<E>>,
}

impl<E: Entity> CrudService<E> {
    pub fn new(name: impl Into<String>, manager: BaseManager<E>) -> Self {
        Self {
            model: ModelService::new(name, manager),
            pk: E::pk_info(),
            cache: None,
        }
    }

    /// Serve `get_by_pk` from `cache` and invalidate it on writes.
    pub fn with_cache(mut self, cache: ModelCache<E>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn pk_info(&self) -> &PkInfo {
        &self.pk
    }

    pub fn model(&self) -> &ModelService<E> {
        &self.model
    }

    fn manager(&self) -> &BaseManager<E> {
        self.model.manager()
    }

    /// Map an `id`/`uuid`/`pk` keyword onto the real pk name when the real
    /// name is absent. An explicit real name leaves the aliases untouched.
    pub fn normalize_pk_kwargs(&self, kwargs: Record) -> Record {
        normalize_pk_keys(&self.pk, kwargs)
    }

    /// Primary key carried by `data`: the pk name first, then its alias.
    pub fn pk_value_from_data(&self, data: &Record) -> Option<Value> {
        [self.pk.name.as_str(), self.pk.alias()]
            .into_iter()
            .find_map(|key| args::opt_value(data, key))
    }

    fn pk_filter(&self, pk: &Value) -> Vec<FilterField> {
        vec![FilterField::exact(self.pk.name.clone(), pk.clone())]
    }

    pub(crate) async fn invalidate_cache(&self) {
        if let Some(cache) = &self.cache {
            let removed = cache.invalidate_model().await;
            debug!(model = %E::MODEL_NAME, removed, "Invalidated model cache");
        }
    }

    /// Insert `objects` in batches of `batch_size`. Each batch is all or
    /// nothing.
    pub async fn bulk_create(
        &self,
        objects: Vec<Record>,
        batch_size: Option<usize>,
    ) -> AppResult<OperationOutcome<Vec<E>>> {
        let batch_size = batch_size.unwrap_or(DEFAULT_BATCH_SIZE).max(1);
        let mut created = Vec::with_capacity(objects.len());
        let mut objects = objects.into_iter().map(|o| self.normalize_pk_kwargs(o)).peekable();
        while objects.peek().is_some() {
            let batch: Vec<Record> = objects.by_ref().take(batch_size).collect();
            created.extend(self.manager().store().insert_many(batch).await?);
        }
        self.invalidate_cache().await;
        let message = format!("Created {} objects", created.len());
        info!(model = %E::MODEL_NAME, "{message}");
        Ok(OperationOutcome::ok(created, message))
    }

    /// Update each object by its primary key, writing `fields` (every
    /// non-pk field by default). Each batch is all or nothing.
    pub async fn bulk_update(
        &self,
        objects: Vec<Record>,
        fields: Option<&[String]>,
        batch_size: Option<usize>,
    ) -> AppResult<OperationOutcome<Vec<E>>> {
        let batch_size = batch_size.unwrap_or(DEFAULT_BATCH_SIZE).max(1);
        let mut writes = Vec::with_capacity(objects.len());
        for object in objects {
            let pk = self
                .pk_value_from_data(&object)
                .ok_or_else(|| AppError::validation("Missing identifier"))?;
            let mut changes = strip_pk_keys::<E>(object);
            if let Some(fields) = fields {
                changes.retain(|key, _| fields.contains(key));
            }
            writes.push(WriteOp::Update {
                filters: self.pk_filter(&pk),
                changes,
            });
        }

        let mut updated = Vec::new();
        let mut writes = writes.into_iter().peekable();
        while writes.peek().is_some() {
            let batch: Vec<_> = writes.by_ref().take(batch_size).collect();
            let outcomes = self
                .manager()
                .store()
                .apply(batch, true)
                .await
                .map_err(|(_, e)| e)?;
            for outcome in outcomes {
                if let WriteOutcome::Updated(Some(entity)) = outcome? {
                    updated.push(entity);
                }
            }
        }
        self.invalidate_cache().await;
        let message = format!("Updated {} objects", updated.len());
        info!(model = %E::MODEL_NAME, "{message}");
        Ok(OperationOutcome::ok(updated, message))
    }

    /// Delete the rows whose `field` (the pk by default) is in
    /// `identifiers`.
    pub async fn bulk_delete(
        &self,
        identifiers: Vec<Value>,
        field: Option<&str>,
    ) -> AppResult<OperationOutcome<u64>> {
        let field = self.pk.resolve(field.unwrap_or("pk")).to_string();
        let deleted = self
            .manager()
            .store()
            .delete(&[FilterField::is_in(field, identifiers)])
            .await?;
        self.invalidate_cache().await;
        let message = format!("Deleted {deleted} objects");
        info!(model = %E::MODEL_NAME, "{message}");
        Ok(OperationOutcome::ok(deleted, message))
    }

    /// Update the row matching `match_fields` (the pk by default) or create
    /// it. The match and the write happen atomically in the store.
    ///
    /// Match fields absent from `data`, or null there, are left out of the
    /// lookup. With none left the row is always created.
    pub async fn upsert(
        &self,
        data: Record,
        match_fields: Option<&[String]>,
        update_fields: Option<&[String]>,
    ) -> AppResult<OperationOutcome<E>> {
        let data = self.normalize_pk_kwargs(data);
        let match_fields: Vec<String> = match match_fields {
            Some(fields) if !fields.is_empty() => {
                fields.iter().map(|f| self.pk.resolve(f).to_string()).collect()
            }
            _ => vec![self.pk.name.clone()],
        };

        let lookup: Vec<FilterField> = match_fields
            .iter()
            .filter_map(|f| {
                data.get(f)
                    .filter(|v| !v.is_null())
                    .map(|v| FilterField::exact(f.clone(), v.clone()))
            })
            .collect();
        if lookup.is_empty() {
            let entity = self.manager().store().insert(data).await?;
            self.invalidate_cache().await;
            return Ok(OperationOutcome::ok(entity, "Created new object"));
        }

        let update_fields: Vec<String> = match update_fields {
            Some(fields) => fields.to_vec(),
            None => data.keys().filter(|k| !self.pk.is_pk_key(k)).cloned().collect(),
        };
        let upserted = self
            .manager()
            .store()
            .upsert(&lookup, data, &update_fields)
            .await?;
        self.invalidate_cache().await;
        let message = if upserted.created {
            "Created new object"
        } else {
            "Updated existing object"
        };
        Ok(OperationOutcome::ok(upserted.entity, message))
    }

    /// Row matching `lookup`, created from `lookup` plus `defaults` when
    /// missing. The value is `{object, created}`.
    pub async fn get_or_create(
        &self,
        lookup: Record,
        defaults: Record,
    ) -> AppResult<OperationOutcome<Value>> {
        let (entity, created) = self
            .manager()
            .get_or_create_safe(self.normalize_pk_kwargs(lookup), defaults)
            .await?;
        if created {
            self.invalidate_cache().await;
        }
        let message = if created { "Created new object" } else { "Found existing object" };
        Ok(OperationOutcome::ok(json!({"object": entity, "created": created}), message))
    }

    /// Row by primary key, read through the model cache when one is
    /// attached.
    pub async fn get_by_pk(&self, pk: &Value) -> AppResult<Option<E>> {
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get_cached_entity(pk).await {
                return Ok(Some(hit));
            }
        }
        let found = self.manager().get_by_pk(pk).await?;
        if let (Some(cache), Some(entity)) = (&self.cache, &found) {
            cache.cache_entity(entity).await;
        }
        Ok(found)
    }

    /// Row matching the keyword filters after pk normalization.
    pub async fn get(&self, kwargs: Record) -> AppResult<Option<E>> {
        let kwargs = self.normalize_pk_kwargs(kwargs);
        self.manager().store().fetch_one(&filters_for::<E>(&kwargs)).await
    }

    /// Apply `data` to the row with primary key `pk`. Primary-key fields in
    /// `data` are ignored.
    pub async fn update(&self, pk: &Value, data: Record) -> AppResult<Option<E>> {
        let updated = self.model.update(pk, &strip_pk_keys::<E>(data)).await?;
        if let Some(entity) = &updated {
            if let Some(cache) = &self.cache {
                cache.invalidate_entity(entity).await;
            }
            self.invalidate_cache().await;
        }
        Ok(updated)
    }

    pub async fn delete(&self, pk: &Value) -> AppResult<bool> {
        let deleted = self.model.delete(pk).await?;
        if deleted {
            self.invalidate_cache().await;
        }
        Ok(deleted)
    }
}

#[async_trait]
impl<E: Entity> Service for CrudService<E> {
    fn name(&self) -> &str {
        self.model.name()
    }

    async fn execute(&self, operation: &str, args: Record) -> AppResult<Value> {
        match operation {
            "bulk_create" => {
                let objects: Vec<Record> = args::required(&args, "objects")?;
                to_json(&self.bulk_create(objects, args::opt_usize(&args, "batch_size")).await?)
            }
            "bulk_update" => {
                let objects: Vec<Record> = args::required(&args, "objects")?;
                let fields: Option<Vec<String>> = args::typed(&args, "fields")?;
                let batch_size = args::opt_usize(&args, "batch_size");
                to_json(&self.bulk_update(objects, fields.as_deref(), batch_size).await?)
            }
            "bulk_delete" => {
                let identifiers: Vec<Value> = args::required(&args, "identifiers")?;
                to_json(&self.bulk_delete(identifiers, args::opt_str(&args, "field")).await?)
            }
            "upsert" => {
                let data = args::record(&args, "data")?;
                let match_fields: Option<Vec<String>> = args::typed(&args, "match_fields")?;
                let update_fields: Option<Vec<String>> = args::typed(&args, "update_fields")?;
                to_json(
                    &self
                        .upsert(data, match_fields.as_deref(), update_fields.as_deref())
                        .await?,
                )
            }
            "get_or_create" => {
                let mut lookup = args;
                let defaults = match lookup.remove("defaults") {
                    Some(Value::Object(map)) => map,
                    _ => Record::new(),
                };
                to_json(&self.get_or_create(lookup, defaults).await?)
            }
            "get_by_pk" => {
                let pk = pk_arg::<E>(&args)
                    .ok_or_else(|| AppError::validation("Missing identifier"))?;
                to_json(&self.get_by_pk(&pk).await?)
            }
            "get" => to_json(&self.get(args).await?),
            "update" => {
                let pk = pk_arg::<E>(&args)
                    .ok_or_else(|| AppError::validation("Missing identifier"))?;
                to_json(&self.update(&pk, args).await?)
            }
            "delete" => {
                let pk = pk_arg::<E>(&args)
                    .ok_or_else(|| AppError::validation("Missing identifier"))?;
                to_json(&self.delete(&pk).await?)
            }
            other => self.model.execute(other, args).await,
        }
    }
}
