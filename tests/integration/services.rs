//! Service dispatch through the registry.

use http::StatusCode;
use serde_json::json;

use crate::helpers::TestApp;

#[tokio::test]
async fn test_list_services() {
    let app = TestApp::new();
    let resp = app.get("/services").await;
    assert_eq!(resp.status, StatusCode::OK);
    let names = resp.json();
    for expected in ["people", "tags", "people_search", "people_protected", "token_service"] {
        assert!(
            names.as_array().unwrap().iter().any(|n| n == expected),
            "missing {expected}"
        );
    }
}

#[tokio::test]
async fn test_create_then_get_person() {
    let app = TestApp::new();
    let created = app
        .post(
            "/services/people/create",
            json!({"name": "Ada", "email": "ada@example.com"}),
        )
        .await;
    assert_eq!(created.status, StatusCode::OK, "{}", created.text());
    let uuid = created.json()["uuid"].as_str().unwrap().to_string();

    let fetched = app
        .post("/services/people/get_by_pk", json!({"pk": uuid}))
        .await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.json()["name"], "Ada");

    let listed = app.get("/people?q=ada").await.json();
    assert_eq!(listed["pagination"]["total_count"], 1);
    assert_eq!(listed["items"][0]["repr"], "Ada <ada@example.com>");
}

#[tokio::test]
async fn test_repeated_upsert_keeps_one_row() {
    let app = TestApp::new();
    let args = |name: &str| {
        json!({
            "data": {"email": "a@b.com", "name": name},
            "match_fields": ["email"],
        })
    };

    let first = app.post("/services/people/upsert", args("X")).await.json();
    assert_eq!(first["message"], "Created new object");
    let second = app.post("/services/people/upsert", args("Y")).await.json();
    assert_eq!(second["message"], "Updated existing object");
    assert_eq!(second["value"]["name"], "Y");

    let listed = app.get("/people").await.json();
    assert_eq!(listed["pagination"]["total_count"], 1);
}

#[tokio::test]
async fn test_transactional_batch_rolls_back() {
    let app = TestApp::new();
    let resp = app
        .post(
            "/services/tags/execute_batch",
            json!({
                "transaction_required": true,
                "operations": [
                    {"type": "create", "data": {"name": "a", "slug": "a"}},
                    {"type": "explode", "data": {}},
                ],
            }),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    let summary = resp.json();
    assert_eq!(summary["successful"], 0);
    assert_eq!(summary["failed"], 2);
    assert_eq!(summary["results"][0]["error"], "Rolled back");

    let listed = app.get("/tags").await.json();
    assert_eq!(listed["pagination"]["total_count"], 0);
}

#[tokio::test]
async fn test_search_service() {
    let app = TestApp::new();
    for name in ["Ada", "Adam", "Grace"] {
        app.post("/services/people/create", json!({"name": name})).await;
    }

    let resp = app
        .post("/services/people_search/search", json!({"query": "ada"}))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["total_count"], 2);
    assert_eq!(body["has_more"], false);
}

#[tokio::test]
async fn test_protected_service_requires_token() {
    let app = TestApp::new();

    let denied = app
        .post("/services/people_protected/create", json!({"name": "Eve"}))
        .await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let issued = app
        .post("/tokens", json!({"user_id": "u-1", "action": "create"}))
        .await
        .json();
    let token = issued["token"].as_str().unwrap();
    let created = app
        .post(
            "/services/people_protected/create",
            json!({"token": token, "name": "Eve"}),
        )
        .await;
    assert_eq!(created.status, StatusCode::OK, "{}", created.text());
    assert_eq!(created.json()["value"]["user_id"], "u-1");
}

#[tokio::test]
async fn test_dispatch_errors() {
    let app = TestApp::new();

    let unknown = app.post("/services/nope/get", json!({})).await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
    assert_eq!(unknown.json()["error"]["message"], "Service not found: nope");

    let bad_op = app.post("/services/tags/frobnicate", json!({})).await;
    assert_eq!(bad_op.status, StatusCode::BAD_REQUEST);

    let not_object = app.request_raw("POST", "/services/tags/list", "[1, 2]").await;
    assert_eq!(not_object.status, StatusCode::BAD_REQUEST);
}
