mod support;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::Value;
use spa_api::{
    application::options::SpaOptions,
    infra::http::{AppState, build_router},
};
use tower::ServiceExt;

use support::{PREVIEW_TOKEN, development, pipeline, production};

fn router(options: SpaOptions) -> Router {
    build_router(AppState::new(pipeline(options)))
}

fn get(uri: &str, host: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(header::HOST, host)
        .body(Body::empty())
        .expect("request should build")
}

fn notification(token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/api/spa/notifications")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
        .body(Body::from(r#"{"kind":"saved","ids":[2]}"#))
        .expect("request should build")
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes()
        .to_vec()
}

async fn json(response: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).expect("json body")
}

#[tokio::test]
async fn spa_endpoint_returns_the_data_model() {
    let app = router(production());

    let response = app
        .clone()
        .oneshot(get("/api/spa?url=/en/about/", "a.com"))
        .await
        .expect("router should respond");
    assert_eq!(response.status(), StatusCode::OK);

    let body = json(response).await;
    assert_eq!(body["pageId"], 2);
    assert_eq!(body["siteId"], 1);
    assert_eq!(body["meta"]["code"], 200);
    assert_eq!(body["isCached"], false);
    assert_eq!(body["content"]["properties"]["title"], "About us");

    let cached = app
        .oneshot(get("/api/spa/?url=/en/about/", "a.com"))
        .await
        .expect("router should respond");
    assert_eq!(json(cached).await["isCached"], true);
}

#[tokio::test]
async fn parts_query_trims_the_json_body() {
    let response = router(production())
        .oneshot(get("/api/spa?url=/da/om/&parts=site", "a.com"))
        .await
        .expect("router should respond");

    let body = json(response).await;
    assert_eq!(body["siteId"], 10);
    assert_eq!(body["site"]["name"], "Eksempel");
    assert!(body.get("content").is_none());
}

#[tokio::test]
async fn missing_pages_are_folded_into_ok() {
    let response = router(production())
        .oneshot(get("/api/spa?url=/en/missing/", "a.com"))
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    assert_eq!(body["meta"]["code"], 404);
    assert_eq!(body["pageId"], 5);
}

#[tokio::test]
async fn preview_token_header_unlocks_previews() {
    let app = router(production());

    let anonymous = app
        .clone()
        .oneshot(get("/api/spa?url=/2/", "a.com"))
        .await
        .expect("router should respond");
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/api/spa?url=/2/")
        .header(header::HOST, "a.com")
        .header("x-spa-preview-token", PREVIEW_TOKEN)
        .body(Body::empty())
        .expect("request should build");
    let response = app.oneshot(request).await.expect("router should respond");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json(response).await["pageId"], 2);
}

#[tokio::test]
async fn pipeline_failures_become_json_errors_in_production() {
    let response = router(production())
        .oneshot(get("/api/spa?url=/", "b.com"))
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("application/json"));
}

#[tokio::test]
async fn development_browsers_get_the_diagnostic_page() {
    let request = Request::builder()
        .uri("/api/spa?url=/")
        .header(header::HOST, "b.com")
        .header(header::ACCEPT, "text/html")
        .header(header::USER_AGENT, "integration-test")
        .body(Body::empty())
        .expect("request should build");

    let response = router(development())
        .oneshot(request)
        .await
        .expect("router should respond");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let html = String::from_utf8(body_bytes(response).await).expect("utf-8 body");
    assert!(html.contains("init_site"));
    assert!(html.contains("integration-test"));
}

#[tokio::test]
async fn notifications_require_the_preview_token() {
    let app = router(production());

    let rejected = app
        .clone()
        .oneshot(notification(None))
        .await
        .expect("router should respond");
    assert_eq!(rejected.status(), StatusCode::UNAUTHORIZED);

    app.clone()
        .oneshot(get("/api/spa?url=/en/about/", "a.com"))
        .await
        .expect("router should respond");

    let accepted = app
        .clone()
        .oneshot(notification(Some(PREVIEW_TOKEN)))
        .await
        .expect("router should respond");
    assert_eq!(accepted.status(), StatusCode::OK);
    let receipt = json(accepted).await;
    assert_eq!(receipt["removed"], 1);
    assert_eq!(receipt["contentGeneration"], 1);
    assert!(receipt["id"].is_string());

    let rebuilt = app
        .oneshot(get("/api/spa?url=/en/about/", "a.com"))
        .await
        .expect("router should respond");
    let body = json(rebuilt).await;
    assert_eq!(body["isCached"], false);
    assert_eq!(body["contentGeneration"], 1);
}

#[tokio::test]
async fn health_endpoint_is_empty() {
    let response = router(production())
        .oneshot(get("/_health", "a.com"))
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn request_ids_are_echoed_or_minted() {
    let app = router(production());
    let request = Request::builder()
        .uri("/_health")
        .header(header::HOST, "a.com")
        .header("x-request-id", "trace-7")
        .body(Body::empty())
        .expect("request should build");

    let echoed = app
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond");
    assert_eq!(
        echoed.headers().get("x-request-id").and_then(|v| v.to_str().ok()),
        Some("trace-7")
    );

    let minted = app
        .oneshot(get("/_health", "a.com"))
        .await
        .expect("router should respond");
    let id = minted
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .expect("minted request id");
    assert!(uuid::Uuid::parse_str(id).is_ok());
}

#[tokio::test]
async fn unreadable_notification_bodies_get_the_error_envelope() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/spa/notifications")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {PREVIEW_TOKEN}"))
        .body(Body::from("{not json"))
        .expect("request should build");

    let response = router(production())
        .oneshot(request)
        .await
        .expect("router should respond");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json(response).await;
    assert_eq!(body["meta"]["code"], 400);
    assert_eq!(body["meta"]["error"], "Invalid notification body.");
}
