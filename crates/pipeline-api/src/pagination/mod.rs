//! Paginated list views.
//!
//! [`params`] resolves the page size and style from the request,
//! [`context::PaginationContext`] describes one page for rendering, and
//! [`htmx::HtmxPagination`] answers HTMX list requests with fragments.

pub mod context;
pub mod htmx;
pub mod params;
pub mod render;

pub use context::{Page, PaginationContext, PaginationUrls, fetch_page};
pub use htmx::HtmxPagination;
pub use params::{PaginationStyle, get_paginate_by, setup_pagination};
pub use render::{DefaultRenderer, ItemRenderer, escape_html};
