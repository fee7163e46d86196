use axum::http::StatusCode;
use tower::ServiceExt;

mod support;

use support::{body_json, empty_request, TestApp};

#[tokio::test]
async fn alive_always_reports_ok() {
    let app = TestApp::new();
    let response = app
        .router()
        .oneshot(empty_request("GET", "/api/health/alive", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!({"status": "ok"}));
}

#[tokio::test]
async fn ready_names_the_failing_service() {
    let app = TestApp::new();
    let response = app
        .router()
        .oneshot(empty_request("GET", "/api/health/ready", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["code"], "SERVICE_UNAVAILABLE");
    assert!(body["error"].as_str().unwrap().contains("postgres"));
}
