//! HTML fragments for paginated lists.

use std::fmt::Write;

use serde_json::{Value, json};

use pipeline_core::result::AppResult;
use pipeline_core::traits::Entity;
use pipeline_core::types::PageRangeItem;
use pipeline_core::types::record::value_to_string;

use super::context::PaginationContext;
use super::params::PaginationStyle;

/// Escape text for HTML element content and double-quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

/// Renders list items for fragment and JSON responses.
pub trait ItemRenderer<E: Entity>: Send + Sync {
    /// One `<li>` per item.
    fn render_items(&self, items: &[E]) -> AppResult<String> {
        let mut html = String::new();
        for item in items {
            let id = value_to_string(&item.pk_value()?);
            let _ = write!(
                html,
                r#"<li class="list-item" data-id="{}">{}</li>"#,
                escape_html(&id),
                escape_html(&item.display())
            );
        }
        Ok(html)
    }

    /// `{id, repr}` per item.
    fn serialize_items(&self, items: &[E]) -> AppResult<Vec<Value>> {
        items
            .iter()
            .map(|item| Ok(json!({ "id": item.pk_value()?, "repr": item.display() })))
            .collect()
    }
}

/// The stock renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRenderer;

impl<E: Entity> ItemRenderer<E> for DefaultRenderer {}

fn link(href: &str, label: &str, class: &str) -> String {
    format!(
        r#"<a class="{class}" href="{href}" hx-get="{href}">{label}</a>"#,
        href = escape_html(href),
        label = escape_html(label),
    )
}

/// Pagination controls for the context's style.
pub fn render_controls(ctx: &PaginationContext, next_url: Option<&str>) -> String {
    let urls = &ctx.pagination_urls;
    let mut html = String::from(r#"<nav class="pagination">"#);

    match ctx.pagination_style {
        PaginationStyle::Numbers => {
            if let Some(prev) = &urls.prev {
                html.push_str(&link(prev, "Previous", "page-prev"));
            }
            for item in ctx.page_range.iter().flatten() {
                match item {
                    PageRangeItem::Page(n) if *n == ctx.page_number => {
                        let _ = write!(html, r#"<span class="page-current">{n}</span>"#);
                    }
                    PageRangeItem::Page(n) => {
                        let href = format!("?{}={n}", ctx.page_kwarg);
                        html.push_str(&link(&href, &n.to_string(), "page-link"));
                    }
                    PageRangeItem::Ellipsis => {
                        html.push_str(r#"<span class="page-ellipsis">...</span>"#)
                    }
                }
            }
            if let Some(next) = &urls.next {
                html.push_str(&link(next, "Next", "page-next"));
            }
        }
        PaginationStyle::Simple => {
            if let Some(prev) = &urls.prev {
                html.push_str(&link(prev, "Previous", "page-prev"));
            }
            let _ = write!(
                html,
                r#"<span class="page-current">Page {} of {}</span>"#,
                ctx.page_number, ctx.total_pages
            );
            if let Some(next) = &urls.next {
                html.push_str(&link(next, "Next", "page-next"));
            }
        }
        PaginationStyle::LoadMore | PaginationStyle::Infinite => {
            if let Some(next) = next_url.filter(|_| ctx.has_next) {
                html.push_str(&load_more_button(next));
            }
        }
    }

    html.push_str("</nav>");
    html
}

pub(crate) fn load_more_button(next_url: &str) -> String {
    format!(
        concat!(
            r##"<button hx-get="{}" hx-target="#items-container" hx-swap="beforeend" "##,
            r#"hx-trigger="click" class="btn btn-outline-primary">Load More</button>"#,
        ),
        escape_html(next_url)
    )
}
