//! Paginated list endpoints, JSON and HTMX.

use http::StatusCode;
use serde_json::{Value, json};

use crate::helpers::TestApp;

/// 25 tags named `t01`..`t25`.
async fn seeded() -> TestApp {
    let app = TestApp::new();
    let objects: Vec<Value> = (1..=25)
        .map(|i| json!({"name": format!("t{i:02}"), "slug": format!("t{i:02}")}))
        .collect();
    let resp = app
        .post("/services/tags/bulk_create", json!({"objects": objects}))
        .await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.text());
    app
}

#[tokio::test]
async fn test_json_page_with_context() {
    let app = seeded().await;
    let resp = app.get("/tags?ordering=name&page=2").await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 10);
    assert_eq!(items[0]["repr"], "t11");

    let ctx = &body["pagination"];
    assert_eq!(ctx["page_number"], 2);
    assert_eq!(ctx["total_pages"], 3);
    assert_eq!(ctx["total_count"], 25);
    assert_eq!(ctx["has_previous"], true);
    assert_eq!(ctx["next_page_number"], 3);
    assert_eq!(ctx["start_index"], 11);
    assert_eq!(ctx["end_index"], 20);
    assert_eq!(ctx["pagination_style"], "numbers");
    assert_eq!(ctx["is_htmx_pagination"], false);
    assert_eq!(ctx["pagination_urls"]["prev"], "/tags?page=1");
}

#[tokio::test]
async fn test_per_page_is_capped_and_bad_page_falls_back() {
    let app = seeded().await;

    let capped = app.get("/tags?per_page=1000").await.json();
    assert_eq!(capped["pagination"]["current_per_page"], 100);
    assert_eq!(capped["items"].as_array().unwrap().len(), 25);

    let beyond = app.get("/tags?page=99").await.json();
    assert_eq!(beyond["pagination"]["page_number"], 3);

    let junk = app.get("/tags?page=abc").await.json();
    assert_eq!(junk["pagination"]["page_number"], 1);
}

#[tokio::test]
async fn test_search_filters_items() {
    let app = seeded().await;
    let resp = app.get("/tags?q=T2").await.json();
    // t20..t25
    assert_eq!(resp["pagination"]["total_count"], 6);
}

#[tokio::test]
async fn test_htmx_regular_swap() {
    let app = seeded().await;
    let resp = app
        .request("GET", "/tags?ordering=name&page=3", None, &[("hx-request", "true")])
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(
        resp.header_json("hx-trigger"),
        json!({"pageChanged": {"page": 3, "total": 3}})
    );
    assert_eq!(resp.header("hx-push-url"), Some("/tags?ordering=name&page=3"));
    let html = resp.text();
    assert!(html.contains(r#"<div id="items-container" hx-swap-oob="true">"#));
    assert!(html.contains("t25"));
}

#[tokio::test]
async fn test_htmx_load_more_appends() {
    let app = seeded().await;
    let resp = app
        .request(
            "GET",
            "/tags?ordering=name&page=1",
            None,
            &[("hx-request", "true"), ("hx-trigger", "load-more")],
        )
        .await;

    assert_eq!(resp.header("hx-reswap"), Some("beforeend"));
    assert_eq!(
        resp.header_json("hx-trigger"),
        json!({"itemsLoaded": {"count": 10, "page": 1, "has_more": true}})
    );
    assert!(resp.text().contains("ordering=name&amp;page=2"));
}

#[tokio::test]
async fn test_htmx_infinite_scroll_returns_json() {
    let app = seeded().await;
    let resp = app
        .request(
            "GET",
            "/tags?page=3",
            None,
            &[("hx-request", "true"), ("hx-trigger", "infinite-scroll")],
        )
        .await;

    let body = resp.json();
    assert_eq!(body["page"], 3);
    assert_eq!(body["has_next"], false);
    assert_eq!(body["next_page_url"], Value::Null);
    assert_eq!(body["items"].as_array().unwrap().len(), 5);
}
