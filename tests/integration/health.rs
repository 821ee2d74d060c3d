//! Health endpoint tests.

use http::StatusCode;

use crate::helpers::TestApp;

#[tokio::test]
async fn test_health_reports_ok() {
    let app = TestApp::new();
    let resp = app.get("/health").await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_detailed_health_lists_services() {
    let app = TestApp::new();
    let resp = app.get("/health/detailed").await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["cache"], "connected");
    assert_eq!(body["online_users"], 0);
    let services: Vec<&str> = body["services"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|s| s.as_str())
        .collect();
    assert!(services.contains(&"people"));
    assert!(services.contains(&"token_service"));
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = TestApp::new();
    let resp = app.get("/nope").await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}
