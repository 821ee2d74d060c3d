//! Page fetching and the pagination context.

use serde::Serialize;

use pipeline_core::config::pagination::PaginationConfig;
use pipeline_core::result::AppResult;
use pipeline_core::traits::{Entity, EntityStore};
use pipeline_core::types::{PageRangeItem, PageWindow, Paginator, Query, page_range};

use super::params::PaginationStyle;

/// Items of one page plus its window.
#[derive(Debug, Clone)]
pub struct Page<E> {
    pub items: Vec<E>,
    pub window: PageWindow,
}

/// Count `query`, resolve the raw page parameter and fetch that page.
pub async fn fetch_page<E: Entity>(
    store: &dyn EntityStore<E>,
    query: Query,
    config: &PaginationConfig,
    raw_page: Option<&str>,
    per_page: usize,
) -> AppResult<Page<E>> {
    let count = store.count(&query).await?;
    let paginator = Paginator::new(count as usize, per_page)
        .with_orphans(config.orphans)
        .allow_empty_first_page(config.allow_empty_first_page);
    let window = paginator.window(raw_page);

    let items = if window.len == 0 {
        Vec::new()
    } else {
        store
            .fetch(&query.offset(window.offset).limit(window.len))
            .await?
    };
    Ok(Page { items, window })
}

/// Links to the first, last, previous and next pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaginationUrls {
    pub first: String,
    pub last: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

/// Everything a list view needs to render one page and its controls.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaginationContext {
    pub is_paginated: bool,
    pub page_number: usize,
    pub total_pages: usize,
    pub has_next: bool,
    pub has_previous: bool,
    pub next_page_number: Option<usize>,
    pub previous_page_number: Option<usize>,
    /// Items on this page.
    pub data_count: usize,
    pub start_index: usize,
    pub end_index: usize,
    pub total_count: usize,
    pub pagination_style: PaginationStyle,
    pub page_kwarg: String,
    pub paginate_by_param: String,
    pub current_per_page: usize,
    pub is_htmx_pagination: bool,
    /// Only for the numbered style.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_range: Option<Vec<PageRangeItem>>,
    pub pagination_urls: PaginationUrls,
}

impl PaginationContext {
    pub fn new(
        window: &PageWindow,
        config: &PaginationConfig,
        style: PaginationStyle,
        is_htmx: bool,
        path: &str,
    ) -> Self {
        let url = |page: usize| format!("{path}?{}={page}", config.page_kwarg);

        Self {
            is_paginated: window.num_pages > 1,
            page_number: window.number,
            total_pages: window.num_pages,
            has_next: window.has_next(),
            has_previous: window.has_previous(),
            next_page_number: window.next_page_number(),
            previous_page_number: window.previous_page_number(),
            data_count: window.len,
            start_index: window.start_index(),
            end_index: window.end_index(),
            total_count: window.count,
            pagination_style: style,
            page_kwarg: config.page_kwarg.clone(),
            paginate_by_param: config.paginate_by_param.clone(),
            current_per_page: window.per_page,
            is_htmx_pagination: is_htmx,
            page_range: (style == PaginationStyle::Numbers)
                .then(|| page_range(window.number, window.num_pages, config.page_range_delta)),
            pagination_urls: PaginationUrls {
                first: url(1),
                last: url(window.num_pages.max(1)),
                prev: window.previous_page_number().map(url),
                next: window.next_page_number().map(url),
            },
        }
    }
}
