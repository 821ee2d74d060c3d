//! Action token tests.

use http::StatusCode;
use serde_json::json;

use crate::helpers::TestApp;

#[tokio::test]
async fn test_issue_token() {
    let app = TestApp::new();
    let resp = app
        .post("/tokens", json!({"user_id": "7", "action": "edit", "expires_in": 60}))
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["expires_in"], 60);
    assert_eq!(body["payload"]["user_id"], "7");
    assert_eq!(body["payload"]["action"], "edit");
}

#[tokio::test]
async fn test_issue_requires_user_id() {
    let app = TestApp::new();
    let resp = app.post("/tokens", json!({"user_id": ""})).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.json()["error"]["code"], "VALIDATION");
}

#[tokio::test]
async fn test_revoked_token_is_rejected() {
    let app = TestApp::new();
    let token = app.token_for("7").await;
    let bearer = format!("Bearer {token}");

    let ok = app
        .request("GET", "/notifications/pending", None, &[("authorization", &bearer)])
        .await;
    assert_eq!(ok.status, StatusCode::OK);

    let revoked = app.post("/tokens/revoke", json!({"token": token})).await;
    assert_eq!(revoked.status, StatusCode::OK);
    assert_eq!(revoked.json()["success"], true);

    let denied = app
        .request("GET", "/notifications/pending", None, &[("authorization", &bearer)])
        .await;
    assert_eq!(denied.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_garbage_token_is_unauthorized() {
    let app = TestApp::new();
    let resp = app
        .request(
            "GET",
            "/notifications/pending",
            None,
            &[("authorization", "Bearer not-a-token")],
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.json()["error"]["code"], "AUTHENTICATION");
}

#[tokio::test]
async fn test_token_service_runs_through_registry() {
    let app = TestApp::new();
    let issued = app
        .post("/services/token_service/generate", json!({"user_id": "9"}))
        .await;
    assert_eq!(issued.status, StatusCode::OK);
    let token = issued.json()["token"].as_str().unwrap().to_string();

    let checked = app
        .post(
            "/services/token_service/validate",
            json!({"token": token, "action": "read", "user_id": "9"}),
        )
        .await;
    assert_eq!(checked.json()["valid"], true);
}
