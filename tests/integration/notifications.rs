//! Notification delivery over HTMX, flash cookies, SSE and the store.

use axum::body::Body;
use http::{Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use crate::helpers::TestApp;

const HTMX: (&str, &str) = ("hx-request", "true");

#[tokio::test]
async fn test_htmx_request_gets_trigger_header() {
    let app = TestApp::new();
    let resp = app
        .request(
            "GET",
            "/notifications?message=Saved&level=success&title=Done",
            None,
            &[HTMX],
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    let trigger = resp.header_json("hx-trigger");
    assert_eq!(trigger["showNotification"]["message"], "Saved");
    assert_eq!(trigger["showNotification"]["level"], "success");
    assert_eq!(trigger["showNotification"]["title"], "Done");
    assert_eq!(resp.header("hx-reswap"), Some("none"));
    assert_eq!(resp.header("hx-target"), Some(".notifications-init"));
    assert!(resp.cookie("messages").is_none());
}

#[tokio::test]
async fn test_htmx_redirect_uses_hx_redirect() {
    let app = TestApp::new();
    let resp = app
        .request(
            "GET",
            "/notifications?message=Saved&redirect=/people",
            None,
            &[HTMX],
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.header("hx-redirect"), Some("/people"));
    assert!(resp.header("location").is_none());
    assert_eq!(resp.header_json("hx-trigger")["showNotification"]["message"], "Saved");
}

#[tokio::test]
async fn test_plain_request_flashes_and_redirects() {
    let app = TestApp::new();
    let resp = app
        .get("/notifications?message=Profile%20updated&level=success&redirect=/people")
        .await;

    assert_eq!(resp.status, StatusCode::FOUND);
    assert_eq!(resp.header("location"), Some("/people"));
    assert!(resp.header("hx-trigger").is_none());
    let cookie = resp.cookie("messages").expect("flash cookie");

    // The next page load reads the message and clears the cookie.
    let pending = app
        .request("GET", "/notifications/pending", None, &[("cookie", &cookie)])
        .await;
    assert_eq!(pending.status, StatusCode::OK);
    let messages = pending.json()["messages"].as_array().unwrap().clone();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["message"], "Profile updated");
    assert_eq!(messages[0]["level"], "success");
    assert_eq!(messages[0]["source"], "flash");
    assert_eq!(pending.cookie("messages").as_deref(), Some("messages="));
}

#[tokio::test]
async fn test_plain_post_without_redirect_reports_flash() {
    let app = TestApp::new();
    let resp = app
        .post("/notifications", json!({"message": "Queued", "level": "warning"}))
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["delivered"], "flash");
    assert!(resp.cookie("messages").is_some());
}

#[tokio::test]
async fn test_htmx_post_accepting_event_stream_gets_one_frame() {
    let app = TestApp::new();
    let resp = app
        .request(
            "POST",
            "/notifications",
            Some(json!({"message": "ping"})),
            &[HTMX, ("accept", "text/event-stream")],
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.header("content-type"), Some("text/event-stream"));
    assert_eq!(resp.header("cache-control"), Some("no-cache"));
    let text = resp.text();
    assert!(text.starts_with("event: notification\ndata: "));
    assert!(text.ends_with("\n\n"));
}

#[tokio::test]
async fn test_post_rejects_invalid_payloads() {
    let app = TestApp::new();

    let malformed = app.request_raw("POST", "/notifications", "{not json").await;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);
    assert_eq!(malformed.json()["error"]["message"], "Invalid JSON");

    let missing = app.post("/notifications", json!({"level": "info"})).await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing.json()["error"]["message"], "Message is required");

    let bad_level = app
        .request(
            "POST",
            "/notifications",
            Some(json!({"message": "x", "level": "loud"})),
            &[HTMX],
        )
        .await;
    assert_eq!(bad_level.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_broadcast_to_offline_user_is_stored_until_pending() {
    let app = TestApp::new();
    let resp = app
        .post(
            "/notifications",
            json!({"message": "Build finished", "level": "success", "user_ids": [42, "43"]}),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["delivered"], "broadcast");
    assert_eq!(resp.json()["recipients"], 2);

    let token = app.token_for("42").await;
    let bearer = format!("Bearer {token}");
    let pending = app
        .request("GET", "/notifications/pending", None, &[("authorization", &bearer)])
        .await;
    let notifications = pending.json()["notifications"].as_array().unwrap().clone();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["message"], "Build finished");

    // Popped on read.
    let again = app
        .request("GET", &format!("/notifications/pending?token={token}"), None, &[])
        .await;
    assert!(again.json()["notifications"].as_array().unwrap().is_empty());
    assert_eq!(app.state.hub.store().get("43").len(), 1);
}

#[tokio::test]
async fn test_stream_opens_event_stream() {
    let app = TestApp::new();
    let req = Request::builder()
        .uri("/notifications/stream")
        .header("accept", "text/event-stream")
        .body(Body::empty())
        .unwrap();

    // Only the head is inspected; the body stays open.
    let response = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/event-stream");
    assert_eq!(response.headers()["x-accel-buffering"], "no");
}
