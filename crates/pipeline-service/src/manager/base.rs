//! Store-backed lookup helpers shared by every manager.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use pipeline_core::result::AppResult;
use pipeline_core::traits::{Entity, EntityStore};
use pipeline_core::types::{FilterField, PK_ALIASES, PkInfo, Query, Record, SortField};

/// Fields tried, in order, by [`BaseManager::get_by_field`] when no field
/// is given.
pub const LOOKUP_FIELDS: [&str; 5] = ["uuid", "id", "slug", "email", "code"];

/// Counts returned by [`BaseManager::bulk_create_or_update`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkCounts {
    pub created: usize,
    pub updated: usize,
}

/// Rename a pk alias (`pk`, `id` or `uuid`) to the entity's real pk name.
///
/// Nothing is remapped when the real name is already present, so an
/// explicit `uuid` next to an `id` leaves both keys as they are.
pub fn normalize_pk_keys(info: &PkInfo, mut data: Record) -> Record {
    if data.contains_key(&info.name) {
        return data;
    }
    for alias in [info.alias(), "pk"] {
        if alias == info.name {
            continue;
        }
        if let Some(value) = data.remove(alias) {
            data.insert(info.name.clone(), value);
            break;
        }
    }
    data
}

/// Parse a keyword map into filters, mapping `pk` to the real pk name and
/// dropping pk aliases the entity does not declare.
pub fn filters_for<E: Entity>(map: &Record) -> Vec<FilterField> {
    let info = E::pk_info();
    FilterField::parse_map(map)
        .into_iter()
        .filter_map(|mut filter| {
            if filter.field == "pk" {
                filter.field = info.name.clone();
            } else if PK_ALIASES.contains(&filter.field.as_str()) && !E::has_field(&filter.field) {
                return None;
            }
            Some(filter)
        })
        .collect()
}

/// Query matching `query` case-insensitively in any of `fields`.
///
/// A blank query adds no condition. A non-blank query with no fields
/// matches nothing.
pub fn search_query<S: AsRef<str>>(query: &str, fields: &[S]) -> Query {
    let query = query.trim();
    if query.is_empty() {
        return Query::new();
    }
    if fields.is_empty() {
        // An `In` against an empty list never matches.
        return Query::new().filter(FilterField::is_in("__none__", Vec::new()));
    }
    Query::new().any_of(
        fields
            .iter()
            .map(|field| FilterField::icontains(field.as_ref(), query)),
    )
}

/// Thin wrapper over an entity store with the common lookups.
pub struct BaseManager<E: Entity> {
    store: Arc<dyn EntityStore<E>>,
}

impl<E: Entity> Clone for BaseManager<E> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<E: Entity> std::fmt::Debug for BaseManager<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseManager")
            .field("model", &E::MODEL_NAME)
            .finish()
    }
}

impl<E: Entity> BaseManager<E> {
    pub fn new(store: Arc<dyn EntityStore<E>>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn EntityStore<E>> {
        &self.store
    }

    /// Find one row by `field`, or by the first of [`LOOKUP_FIELDS`] the
    /// entity declares that matches.
    pub async fn get_by_field(&self, value: &Value, field: Option<&str>) -> AppResult<Option<E>> {
        if let Some(field) = field {
            let field = if field == "pk" { E::pk_info().name } else { field.to_string() };
            return self.store.fetch_one(&[FilterField::exact(field, value.clone())]).await;
        }
        for field in LOOKUP_FIELDS.iter().filter(|f| E::has_field(f)) {
            if let Some(found) = self
                .store
                .fetch_one(&[FilterField::exact(*field, value.clone())])
                .await?
            {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    pub async fn get_by_pk(&self, pk: &Value) -> AppResult<Option<E>> {
        self.store
            .fetch_one(&[FilterField::exact(E::pk_info().name, pk.clone())])
            .await
    }

    /// Rows matching `filters`, minus those matching all of `exclude`.
    pub async fn filter_by(
        &self,
        filters: &Record,
        exclude: &Record,
        ordering: &[String],
    ) -> AppResult<Vec<E>> {
        let query = Query::new()
            .filters(filters_for::<E>(filters))
            .exclude(filters_for::<E>(exclude))
            .order_by(SortField::parse_all(ordering));
        self.store.fetch(&query).await
    }

    /// Update rows matched by `match_fields` and create the rest.
    ///
    /// Objects that carry none of the match fields are inserted together
    /// at the end. With no `update_fields`, every non-pk field of the
    /// object is written.
    pub async fn bulk_create_or_update(
        &self,
        objects: Vec<Record>,
        update_fields: Option<&[String]>,
        match_fields: &[String],
    ) -> AppResult<BulkCounts> {
        let info = E::pk_info();
        let match_fields: Vec<&str> = match_fields.iter().map(|f| info.resolve(f)).collect();
        let mut counts = BulkCounts::default();
        let mut to_create = Vec::new();

        for object in objects {
            let object = normalize_pk_keys(&info, object);
            let lookup: Vec<FilterField> = match_fields
                .iter()
                .filter_map(|f| object.get(*f).map(|v| FilterField::exact(*f, v.clone())))
                .collect();
            if lookup.is_empty() {
                to_create.push(object);
                continue;
            }
            let fields: Vec<String> = match update_fields {
                Some(fields) => fields.to_vec(),
                None => object.keys().filter(|k| !info.is_pk_key(k)).cloned().collect(),
            };
            let upserted = self.store.upsert(&lookup, object, &fields).await?;
            if upserted.created {
                counts.created += 1;
            } else {
                counts.updated += 1;
            }
        }

        if !to_create.is_empty() {
            counts.created += self.store.insert_many(to_create).await?.len();
        }
        debug!(
            model = %E::MODEL_NAME,
            created = counts.created,
            updated = counts.updated,
            "Bulk create or update"
        );
        Ok(counts)
    }

    /// Fetch the row matching `lookup`, or create it from `lookup` plus
    /// `defaults`. Returns the row and whether it was created.
    pub async fn get_or_create_safe(
        &self,
        lookup: Record,
        defaults: Record,
    ) -> AppResult<(E, bool)> {
        let info = E::pk_info();
        let lookup = normalize_pk_keys(&info, lookup);
        let filters = filters_for::<E>(&lookup);
        let mut data = lookup;
        data.extend(defaults);
        let upserted = self.store.upsert(&filters, data, &[]).await?;
        Ok((upserted.entity, upserted.created))
    }

    pub async fn exists_by(&self, filters: &Record) -> AppResult<bool> {
        self.store.exists(&filters_for::<E>(filters)).await
    }

    pub async fn count_by(&self, filters: &Record) -> AppResult<u64> {
        self.store
            .count(&Query::new().filters(filters_for::<E>(filters)))
            .await
    }

    /// Newest row by `field` among those matching `filters`.
    pub async fn latest_by(&self, field: &str, filters: &Record) -> AppResult<Option<E>> {
        let query = Query::new()
            .filters(filters_for::<E>(filters))
            .order_by([SortField::desc(field)])
            .limit(1);
        Ok(self.store.fetch(&query).await?.into_iter().next())
    }

    /// Rows containing `query` in any of `fields` (the entity's search
    /// fields by default).
    pub async fn search(
        &self,
        query: &str,
        fields: Option<&[String]>,
        filters: &Record,
        ordering: &[String],
        limit: Option<usize>,
    ) -> AppResult<Vec<E>> {
        let mut q = match fields {
            Some(fields) => search_query(query, fields),
            None => search_query(query, E::search_fields()),
        }
        .filters(filters_for::<E>(filters))
        .order_by(SortField::parse_all(ordering));
        q.limit = limit;
        self.store.fetch(&q).await
    }
}
