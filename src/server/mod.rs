pub mod handlers;
pub mod rate_limit;
pub mod url_validation;

use crate::config::Config;
use axum::{Router, middleware, routing::get};
use metrics_exporter_prometheus::PrometheusBuilder;
use rate_limit::RateLimiter;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Shared HTTP client for connection pooling across upstream hosts
    pub http_client: Client,
    /// Per-IP rate limiter, present when RATE_LIMIT_RPM > 0
    pub rate_limiter: Option<RateLimiter>,
}

impl AppState {
    /// Create a new AppState with the given configuration
    pub fn new(config: Config) -> Self {
        // No client-wide timeout here: a total-request timeout would cap
        // long-lived segment streams. The fetch timeout is applied per
        // request in the proxy handler.
        let http_client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build()
            .expect("Failed to create HTTP client");

        let rate_limiter = (config.rate_limit_rpm > 0)
            .then(|| RateLimiter::new(config.rate_limit_rpm));

        Self {
            config: Arc::new(config),
            http_client,
            rate_limiter,
        }
    }
}

/// Build the proxy router with all routes and middleware.
///
/// Separate from [`start`] so integration tests can drive the router
/// without binding a listener or installing the metrics recorder.
pub fn build_router(config: Config) -> Router {
    let state = AppState::new(config);

    Router::new()
        .route("/", get(handlers::health::health_check))
        .route("/health", get(handlers::health::health_check))
        .route("/proxy", get(handlers::proxy::proxy_fetch))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_middleware,
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the Axum HTTP server
pub async fn start(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("0.0.0.0:{}", config.port);

    let prometheus = PrometheusBuilder::new().install_recorder()?;

    let app = build_router(config).route(
        "/metrics",
        get(move || {
            let handle = prometheus.clone();
            async move { handle.render() }
        }),
    );

    // Bind TCP listener
    let listener = match tokio::net::TcpListener::bind(addr.as_str()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to address {}: {}", addr, e);
            return Err(e.into());
        }
    };

    info!("🚀 Server listening on http://{}", addr);

    // Start serving
    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
