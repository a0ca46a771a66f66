use axum::Json;
use serde_json::{Value, json};
use std::sync::OnceLock;
use std::time::Instant;

static STARTED: OnceLock<Instant> = OnceLock::new();

/// Service status payload for `GET /` and `GET /health`.
pub async fn health_check() -> Json<Value> {
    let started = STARTED.get_or_init(Instant::now);

    Json(json!({
        "status": "ok",
        "service": "hlsrelay",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": started.elapsed().as_secs(),
    }))
}
