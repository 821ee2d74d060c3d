//! Paginated list handlers for the demo entities.

use std::collections::HashMap;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::Uri;
use axum::response::{IntoResponse, Response};

use pipeline_core::config::pagination::PaginationConfig;
use pipeline_core::result::AppResult;
use pipeline_core::traits::Entity;
use pipeline_core::types::SortField;
use pipeline_entity::{Person, Tag};
use pipeline_service::BaseManager;
use pipeline_service::manager::base::search_query;

use crate::dto::response::ListResponse;
use crate::error::ApiError;
use crate::extractors::HtmxRequest;
use crate::pagination::{
    DefaultRenderer, HtmxPagination, ItemRenderer, PaginationContext, fetch_page, get_paginate_by,
    setup_pagination,
};
use crate::state::AppState;

/// Shared list flow: search, order, paginate, then answer with HTMX
/// fragments or a JSON page.
async fn list_entities<E: Entity>(
    manager: &BaseManager<E>,
    config: &PaginationConfig,
    params: &HashMap<String, String>,
    htmx: &HtmxRequest,
    uri: &Uri,
) -> AppResult<Response> {
    let style = setup_pagination(config, params, htmx);
    let per_page = get_paginate_by(config, params);

    let ordering: Vec<&str> = params
        .get("ordering")
        .map(|raw| raw.split(',').map(str::trim).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();
    let query = search_query(params.get("q").map(String::as_str).unwrap_or(""), E::search_fields())
        .order_by(SortField::parse_all(&ordering));

    let page = fetch_page(
        manager.store().as_ref(),
        query,
        config,
        params.get(&config.page_kwarg).map(String::as_str),
        per_page,
    )
    .await?;
    let ctx = PaginationContext::new(&page.window, config, style, htmx.enabled, uri.path());

    let renderer = DefaultRenderer;
    if let Some(response) = HtmxPagination::new(renderer).respond(htmx, uri, &ctx, &page.items)? {
        return Ok(response);
    }

    Ok(Json(ListResponse {
        items: ItemRenderer::<E>::serialize_items(&renderer, &page.items)?,
        pagination: ctx,
    })
    .into_response())
}

/// GET /people
pub async fn list_people(
    State(state): State<AppState>,
    htmx: HtmxRequest,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let config = &state.config.pagination;
    Ok(list_entities::<Person>(&state.people, config, &params, &htmx, &uri).await?)
}

/// GET /tags
pub async fn list_tags(
    State(state): State<AppState>,
    htmx: HtmxRequest,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    Ok(list_entities::<Tag>(&state.tags, &state.config.pagination, &params, &htmx, &uri).await?)
}
