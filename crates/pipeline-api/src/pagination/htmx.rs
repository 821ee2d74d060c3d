//! HTMX responses for paginated lists.

use axum::Json;
use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, Uri};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use pipeline_core::result::AppResult;
use pipeline_core::traits::Entity;

use super::context::PaginationContext;
use super::render::{ItemRenderer, load_more_button, render_controls};
use crate::extractors::HtmxRequest;
use crate::notify::notifier::{header_value, trigger_header};

const HX_TRIGGER: HeaderName = HeaderName::from_static("hx-trigger");
const HX_RESWAP: HeaderName = HeaderName::from_static("hx-reswap");
const HX_PUSH_URL: HeaderName = HeaderName::from_static("hx-push-url");

/// `uri` with its page parameter set to `page`, other parameters kept.
pub fn next_page_url(uri: &Uri, page_kwarg: &str, page: usize) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    if let Some(query) = uri.query() {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if key != page_kwarg {
                serializer.append_pair(&key, &value);
            }
        }
    }
    serializer.append_pair(page_kwarg, &page.to_string());
    format!("{}?{}", uri.path(), serializer.finish())
}

/// Builds the HTMX answer to a list request.
///
/// The `HX-Trigger` request header selects the shape: `load-more` appends
/// items and refreshes the load-more control, `infinite-scroll` returns
/// JSON, anything else swaps the items and the controls.
#[derive(Debug, Clone)]
pub struct HtmxPagination<R> {
    renderer: R,
    push_url: bool,
}

impl<R> HtmxPagination<R> {
    pub fn new(renderer: R) -> Self {
        Self {
            renderer,
            push_url: true,
        }
    }

    pub fn push_url(mut self, push: bool) -> Self {
        self.push_url = push;
        self
    }

    /// `None` for a request that did not come from HTMX.
    pub fn respond<E: Entity>(
        &self,
        htmx: &HtmxRequest,
        uri: &Uri,
        ctx: &PaginationContext,
        items: &[E],
    ) -> AppResult<Option<Response>>
    where
        R: ItemRenderer<E>,
    {
        if !htmx.enabled {
            return Ok(None);
        }
        let response = match htmx.trigger.as_deref() {
            Some("load-more") => self.load_more(uri, ctx, items)?,
            Some("infinite-scroll") => self.infinite_scroll(uri, ctx, items)?,
            _ => self.regular(htmx, uri, ctx, items)?,
        };
        Ok(Some(response))
    }

    fn next_url(&self, uri: &Uri, ctx: &PaginationContext) -> Option<String> {
        ctx.next_page_number
            .map(|next| next_page_url(uri, &ctx.page_kwarg, next))
    }

    fn regular<E: Entity>(
        &self,
        htmx: &HtmxRequest,
        uri: &Uri,
        ctx: &PaginationContext,
        items: &[E],
    ) -> AppResult<Response>
    where
        R: ItemRenderer<E>,
    {
        let items_html = self.renderer.render_items(items)?;
        let controls_html = render_controls(ctx, self.next_url(uri, ctx).as_deref());
        let swap = htmx.swap.as_deref().unwrap_or("innerHTML");

        let (body, trigger) = if swap == "innerHTML" {
            let body = format!(
                concat!(
                    r#"<div id="items-container" hx-swap-oob="true">{items_html}</div>"#,
                    r#"<div id="pagination-container" hx-swap-oob="true">{controls_html}</div>"#,
                ),
                items_html = items_html,
                controls_html = controls_html,
            );
            let trigger = json!({
                "pageChanged": { "page": ctx.page_number, "total": ctx.total_pages }
            });
            (body, Some(trigger))
        } else {
            let body = format!(
                concat!(
                    r#"<div id="items-container">{items_html}</div>"#,
                    r#"<div id="pagination-container">{controls_html}</div>"#,
                ),
                items_html = items_html,
                controls_html = controls_html,
            );
            (body, None)
        };

        let mut response = html_response(body);
        let headers = response.headers_mut();
        if let Some(trigger) = trigger {
            headers.insert(HX_TRIGGER, trigger_header(&trigger)?);
        }
        if self.push_url {
            headers.insert(HX_PUSH_URL, header_value(&uri.to_string())?);
        }
        Ok(response)
    }

    fn load_more<E: Entity>(
        &self,
        uri: &Uri,
        ctx: &PaginationContext,
        items: &[E],
    ) -> AppResult<Response>
    where
        R: ItemRenderer<E>,
    {
        let mut body = self.renderer.render_items(items)?;
        match self.next_url(uri, ctx).filter(|_| ctx.has_next) {
            Some(next) => {
                body.push_str(r#"<div id="load-more-container" hx-swap-oob="true">"#);
                body.push_str(&load_more_button(&next));
                body.push_str("</div>");
            }
            None => body.push_str(r#"<div id="load-more-container" hx-swap-oob="delete"></div>"#),
        }

        let trigger = json!({
            "itemsLoaded": {
                "count": ctx.data_count,
                "page": ctx.page_number,
                "has_more": ctx.has_next,
            }
        });

        let mut response = html_response(body);
        let headers = response.headers_mut();
        headers.insert(HX_RESWAP, HeaderValue::from_static("beforeend"));
        headers.insert(HX_TRIGGER, trigger_header(&trigger)?);
        Ok(response)
    }

    fn infinite_scroll<E: Entity>(
        &self,
        uri: &Uri,
        ctx: &PaginationContext,
        items: &[E],
    ) -> AppResult<Response>
    where
        R: ItemRenderer<E>,
    {
        let next_page_url = self.next_url(uri, ctx).filter(|_| ctx.has_next);
        Ok(Json(json!({
            "items": self.renderer.serialize_items(items)?,
            "page": ctx.page_number,
            "has_next": ctx.has_next,
            "next_page_url": next_page_url,
            "total_pages": ctx.total_pages,
            "total_count": ctx.total_count,
        }))
        .into_response())
    }
}

fn html_response(body: String) -> Response {
    let mut response = Response::new(Body::from(body));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
    response
}
