//! Handler-level tests using tower::ServiceExt::oneshot.
//!
//! Tests the full Axum router (middleware + handlers) without binding a TCP
//! listener. Faster and more deterministic than E2E tests.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use hlsrelay::config::Config;
use hlsrelay::server::build_router;
use http_body_util::BodyExt;
use std::time::Duration;
use tower::ServiceExt;

/// Build a test config with sensible defaults.
fn test_config() -> Config {
    Config {
        port: 0,
        is_dev: true,
        upstream_timeout: Duration::from_secs(15),
        user_agent: "Mozilla/5.0 (test)".to_string(),
        forward_range: true,
        forward_origin: true,
        allow_private_targets: true,
        rate_limit_rpm: 0,
    }
}

async fn json_body(resp: axum::response::Response) -> serde_json::Value {
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

// ── Health endpoint ─────────────────────────────────────────────────────────

#[tokio::test]
async fn health_returns_200_with_json() {
    let app = build_router(test_config());

    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let json = json_body(resp).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert!(json["uptime_seconds"].is_number());
}

#[tokio::test]
async fn root_serves_health_payload() {
    let app = build_router(test_config());

    let req = Request::builder().uri("/").body(Body::empty()).unwrap();

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["status"], "ok");
}

// ── 404 for unknown routes ──────────────────────────────────────────────────

#[tokio::test]
async fn unknown_route_returns_404() {
    let app = build_router(test_config());

    let req = Request::builder()
        .uri("/nonexistent")
        .body(Body::empty())
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ── Proxy request validation ────────────────────────────────────────────────

#[tokio::test]
async fn proxy_without_url_returns_400_payload() {
    let app = build_router(test_config());

    let req = Request::builder()
        .uri("/proxy")
        .body(Body::empty())
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let json = json_body(resp).await;
    assert_eq!(json["code"], "missing_url");
    assert!(json["error"].is_string());
    assert!(json["message"].is_string());
}

#[tokio::test]
async fn proxy_rejects_non_http_scheme() {
    let app = build_router(test_config());

    let req = Request::builder()
        .uri("/proxy?url=ftp%3A%2F%2Fcdn.example%2Fseg.ts")
        .body(Body::empty())
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["code"], "invalid_url");
}

#[tokio::test]
async fn proxy_rejects_relative_target() {
    let app = build_router(test_config());

    let req = Request::builder()
        .uri("/proxy?url=segments%2Fseg01.ts")
        .body(Body::empty())
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn proxy_blocks_private_targets_when_not_allowed() {
    let config = Config {
        allow_private_targets: false,
        ..test_config()
    };
    let app = build_router(config);

    // Cloud-metadata endpoint must never be fetchable
    let req = Request::builder()
        .uri("/proxy?url=http%3A%2F%2F169.254.169.254%2Flatest%2Fmeta-data%2F")
        .body(Body::empty())
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["code"], "invalid_url");
}

// ── Rate limiting ───────────────────────────────────────────────────────────

#[tokio::test]
async fn rate_limit_returns_429_over_limit() {
    let config = Config {
        rate_limit_rpm: 2,
        ..test_config()
    };
    let app = build_router(config);

    for _ in 0..2 {
        let req = Request::builder()
            .uri("/health")
            .header("x-forwarded-for", "203.0.113.7")
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let req = Request::builder()
        .uri("/health")
        .header("x-forwarded-for", "203.0.113.7")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json_body(resp).await["code"], "rate_limited");
}

#[tokio::test]
async fn rate_limit_disabled_by_default() {
    let app = build_router(test_config());

    for _ in 0..20 {
        let req = Request::builder()
            .uri("/health")
            .header("x-forwarded-for", "203.0.113.8")
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
