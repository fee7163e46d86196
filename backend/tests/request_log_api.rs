use axum::http::{Request, StatusCode};
use axum::body::Body;
use homelab_backend::models::user::Role;
use tower::ServiceExt;
use uuid::Uuid;

mod support;

use support::{body_json, empty_request, TestApp};

#[tokio::test]
async fn every_request_is_logged_with_request_id() {
    let app = TestApp::new();
    let response = app
        .router()
        .oneshot(
            Request::builder()
                .uri("/api/health/alive")
                .header("x-forwarded-for", "203.0.113.1, 10.0.0.1")
                .header("user-agent", "curl/8.0")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let id = response.headers().get("x-request-id").unwrap().to_str().unwrap();
    assert!(Uuid::parse_str(id).is_ok());

    let logs = app.logs.wait_for(1).await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].method, "GET");
    assert_eq!(logs[0].uri, "/api/health/alive");
    assert_eq!(logs[0].status, 200);
    assert_eq!(logs[0].ip, "203.0.113.1");
    assert_eq!(logs[0].user_agent, "curl/8.0");
    assert!(logs[0].user_id.is_none());
}

#[tokio::test]
async fn caller_request_id_is_echoed() {
    let app = TestApp::new();
    let response = app
        .router()
        .oneshot(
            Request::builder()
                .uri("/api/health/alive")
                .header("x-request-id", "client-req-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.headers().get("x-request-id").unwrap(), "client-req-123");
}

#[tokio::test]
async fn authenticated_requests_record_the_user() {
    let app = TestApp::new();
    let user = app
        .users
        .seed("harry", "harry@example.com", "pw", vec![Role::Default]);
    let token = app.access_token(&user);

    let response = app
        .router()
        .oneshot(empty_request("GET", "/api/invites", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let logs = app.logs.wait_for(1).await;
    assert_eq!(logs[0].user_id, Some(user.uuid));
}

#[tokio::test]
async fn logs_endpoint_is_admin_only() {
    let app = TestApp::new();
    let admin = app
        .users
        .seed("admin", "admin@example.com", "pw", vec![Role::Admin]);
    let user = app
        .users
        .seed("harry", "harry@example.com", "pw", vec![Role::Default]);

    let response = app
        .router()
        .oneshot(empty_request("GET", "/api/logs", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .router()
        .oneshot(empty_request("GET", "/api/logs", Some(&app.access_token(&user))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    app.logs.wait_for(2).await;
    let response = app
        .router()
        .oneshot(empty_request("GET", "/api/logs?limit=1", Some(&app.access_token(&admin))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let logs = body["logs"].as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["status"], 401);
}

#[tokio::test]
async fn hits_counts_logged_requests_without_a_cache() {
    let app = TestApp::new();
    for _ in 0..2 {
        app.router()
            .oneshot(empty_request("GET", "/api/health/alive", None))
            .await
            .unwrap();
    }
    app.logs.wait_for(2).await;

    let response = app
        .router()
        .oneshot(empty_request("GET", "/api/hits?u=/api/health/alive", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["count"], 2);
}
