//! Free-text search, autocomplete, facets and suggestions.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use pipeline_core::error::AppError;
use pipeline_core::result::AppResult;
use pipeline_core::traits::{Entity, Service};
use pipeline_core::types::record::value_to_string;
use pipeline_core::types::{FilterField, Query, Record, SortField};

use pipeline_cache::ModelCache;

use crate::args;
use crate::crud::model::to_json;
use crate::manager::base::{BaseManager, filters_for, search_query};

/// Fields tried by autocomplete when no field is given.
pub const AUTOCOMPLETE_FIELDS: [&str; 4] = ["name", "title", "email", "username"];
/// Fields used by suggestions when none are given.
pub const SUGGESTION_FIELDS: [&str; 2] = ["name", "title"];

fn default_limit() -> usize {
    50
}

/// Arguments of a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub filters: Record,
    #[serde(default)]
    pub ordering: Vec<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            query: String::new(),
            filters: Record::new(),
            ordering: Vec::new(),
            limit: default_limit(),
            offset: 0,
        }
    }
}

impl SearchParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }
}

/// One page of search hits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResults<E> {
    pub results: Vec<E>,
    pub total_count: u64,
    pub limit: usize,
    pub offset: usize,
    pub has_more: bool,
    pub query: String,
    /// Set when the page was served from the cache.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub from_cache: bool,
}

/// Autocomplete entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub id: Value,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Count of one facet value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetCount {
    pub value: Value,
    pub count: u64,
}

/// Facet counts per field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facets {
    pub facets: BTreeMap<String, Vec<FacetCount>>,
    pub total_count: u64,
    pub query: String,
}

/// Search operations over one entity type.
#[derive(Debug, Clone)]
pub struct SearchService<E: Entity> {
    name: String,
    manager: BaseManager<E>,
    cache: Option<ModelCache<E>>,
    search_ttl: Duration,
}

impl<E: Entity> SearchService<E> {
    pub fn new(name: impl Into<String>, manager: BaseManager<E>) -> Self {
        Self {
            name: name.into(),
            manager,
            cache: None,
            search_ttl: Duration::from_secs(900),
        }
    }

    /// Enable [`SearchService::search_cached`].
    pub fn with_cache(mut self, cache: ModelCache<E>, search_ttl: Duration) -> Self {
        self.cache = Some(cache);
        self.search_ttl = search_ttl;
        self
    }

    fn base_query(&self, query: &str, filters: &Record) -> Query {
        search_query(query, E::search_fields()).filters(filters_for::<E>(filters))
    }

    pub async fn search(&self, params: &SearchParams) -> AppResult<SearchResults<E>> {
        let query = self
            .base_query(&params.query, &params.filters)
            .order_by(SortField::parse_all(&params.ordering));
        let store = self.manager.store();
        let total_count = store.count(&query).await?;
        let results = store
            .fetch(&query.offset(params.offset).limit(params.limit))
            .await?;
        Ok(SearchResults {
            results,
            total_count,
            limit: params.limit,
            offset: params.offset,
            has_more: ((params.offset + params.limit) as u64) < total_count,
            query: params.query.clone(),
            from_cache: false,
        })
    }

    /// [`SearchService::search`] through the model cache under the
    /// `search` cache type. Without a cache this is a plain search.
    pub async fn search_cached(&self, params: &SearchParams) -> AppResult<SearchResults<E>> {
        let Some(cache) = &self.cache else {
            return self.search(params).await;
        };
        let key_params = json!({
            "query": params.query,
            "filters": params.filters,
            "ordering": params.ordering,
            "limit": params.limit,
            "offset": params.offset,
        });
        if let Some(mut hit) = cache
            .get_cached::<SearchResults<E>>(None, "search", Some(&key_params))
            .await
        {
            debug!(model = %E::MODEL_NAME, query = %params.query, "Search cache hit");
            hit.from_cache = true;
            return Ok(hit);
        }
        let results = self.search(params).await?;
        cache
            .set_cached(None, &results, "search", Some(&key_params), Some(self.search_ttl))
            .await;
        Ok(results)
    }

    /// Rows whose `field` (or one of [`AUTOCOMPLETE_FIELDS`]) starts with
    /// `query`.
    pub async fn autocomplete(
        &self,
        query: &str,
        field: Option<&str>,
        limit: usize,
    ) -> AppResult<Vec<Completion>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let fields: Vec<&str> = match field {
            Some(field) => vec![field],
            None => AUTOCOMPLETE_FIELDS.into_iter().filter(|f| E::has_field(f)).collect(),
        };
        if fields.is_empty() {
            return Ok(Vec::new());
        }
        let q = Query::new()
            .any_of(fields.iter().map(|f| FilterField::istartswith(*f, query)))
            .limit(limit);
        let kind = E::MODEL_NAME.to_lowercase();
        self.manager
            .store()
            .fetch(&q)
            .await?
            .into_iter()
            .map(|entity| {
                Ok(Completion {
                    id: entity.pk_value()?,
                    text: entity.display(),
                    kind: kind.clone(),
                })
            })
            .collect()
    }

    /// Value counts of each facet field among the rows matching `query`.
    ///
    /// Each facet ignores the filters on its own field so that every value
    /// stays selectable. Counts are sorted by count, highest first.
    pub async fn get_facets(
        &self,
        query: &str,
        filters: &Record,
        facet_fields: &[String],
    ) -> AppResult<Facets> {
        let store = self.manager.store();
        let total_count = store.count(&self.base_query(query, filters)).await?;

        let mut facets = BTreeMap::new();
        for field in facet_fields {
            let others: Record = filters
                .iter()
                .filter(|(key, _)| key.split("__").next() != Some(field.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            let rows = store.fetch(&self.base_query(query, &others)).await?;

            let mut counts: HashMap<String, FacetCount> = HashMap::new();
            for row in rows {
                let value = row.field_value(field)?;
                if value.is_null() {
                    continue;
                }
                counts
                    .entry(value_to_string(&value))
                    .or_insert(FacetCount { value, count: 0 })
                    .count += 1;
            }
            let mut counts: Vec<(String, FacetCount)> = counts.into_iter().collect();
            counts.sort_by(|(ka, a), (kb, b)| b.count.cmp(&a.count).then_with(|| ka.cmp(kb)));
            facets.insert(field.clone(), counts.into_iter().map(|(_, c)| c).collect());
        }

        Ok(Facets {
            facets,
            total_count,
            query: query.to_string(),
        })
    }

    /// Distinct values containing `query`, per field.
    pub async fn get_suggestions(
        &self,
        query: &str,
        fields: Option<&[String]>,
        limit: usize,
    ) -> AppResult<BTreeMap<String, Vec<String>>> {
        let query = query.trim();
        let mut suggestions = BTreeMap::new();
        if query.is_empty() {
            return Ok(suggestions);
        }
        let fields: Vec<String> = match fields {
            Some(fields) => fields.to_vec(),
            None => SUGGESTION_FIELDS.iter().map(|f| f.to_string()).collect(),
        };

        for field in fields.into_iter().filter(|f| E::has_field(f)) {
            let q = Query::new()
                .filter(FilterField::icontains(field.clone(), query))
                .order_by([SortField::asc(field.clone())]);
            let mut values: Vec<String> = Vec::new();
            for row in self.manager.store().fetch(&q).await? {
                let value = row.field_value(&field)?;
                if value.is_null() {
                    continue;
                }
                let text = value_to_string(&value);
                if !values.contains(&text) {
                    values.push(text);
                }
                if values.len() >= limit {
                    break;
                }
            }
            suggestions.insert(field, values);
        }
        Ok(suggestions)
    }
}

#[async_trait]
impl<E: Entity> Service for SearchService<E> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, operation: &str, args: Record) -> AppResult<Value> {
        match operation {
            "search" => {
                let use_cache = args.get("use_cache").and_then(Value::as_bool).unwrap_or(false);
                let params: SearchParams = serde_json::from_value(Value::Object(args))
                    .map_err(|e| AppError::validation(format!("Invalid search arguments: {e}")))?;
                if use_cache {
                    to_json(&self.search_cached(&params).await?)
                } else {
                    to_json(&self.search(&params).await?)
                }
            }
            "autocomplete" => {
                let query = args::opt_str(&args, "query").unwrap_or_default();
                let limit = args::opt_usize(&args, "limit").unwrap_or(10);
                to_json(&self.autocomplete(query, args::opt_str(&args, "field"), limit).await?)
            }
            "facet" => {
                let query = args::opt_str(&args, "query").unwrap_or_default();
                let filters = args::record(&args, "filters")?;
                let fields = args::strings(&args, "facet_fields")?;
                to_json(&self.get_facets(query, &filters, &fields).await?)
            }
            "suggest" => {
                let query = args::opt_str(&args, "query").unwrap_or_default();
                let fields: Option<Vec<String>> = args::typed(&args, "fields")?;
                let limit = args::opt_usize(&args, "limit").unwrap_or(5);
                to_json(&self.get_suggestions(query, fields.as_deref(), limit).await?)
            }
            other => Err(AppError::validation(format!("Unknown operation: {other}"))),
        }
    }
}
