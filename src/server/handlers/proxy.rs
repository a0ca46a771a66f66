//! The forwarding pipeline: `GET /proxy?url=<encoded absolute URL>`.
//!
//! Validates the target, fetches it upstream with forwarded headers,
//! reclassifies from the actual response, then either rewrites (manifests),
//! relays as text (subtitles), or pipes bytes through verbatim (segments
//! and everything else). Exactly one upstream call per client call — the
//! player layer owns retries.

use crate::{
    error::{RelayError, Result},
    metrics,
    proxy::{
        classify::{self, MediaKind, TransferMode},
        rewrite,
    },
    server::{AppState, url_validation::validate_target_url},
};
use axum::{
    body::Body,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures_util::TryStreamExt;
use serde::Deserialize;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct ProxyParams {
    /// Percent-encoded absolute target URL (decoded by the Query extractor)
    url: Option<String>,
}

/// Fetch a remote HLS resource and relay it, transformed as needed.
pub async fn proxy_fetch(
    State(state): State<AppState>,
    Query(params): Query<ProxyParams>,
    headers: HeaderMap,
) -> Result<Response> {
    let start = Instant::now();

    let raw_target = params.url.ok_or(RelayError::MissingTarget)?;
    let target = validate_target_url(&raw_target, state.config.allow_private_targets)?;

    // The URL-only guess picks the transfer mode: text kinds must be
    // buffered for rewriting, binary kinds stream through.
    let expected = classify::classify_by_url(target.as_str());
    let mode = expected.transfer_mode();

    info!(
        "Proxying {} (expected {:?}, {:?} transfer)",
        target, expected, mode
    );

    let mut request = state
        .http_client
        .get(target.clone())
        .header(header::USER_AGENT, state.config.user_agent.as_str())
        .header(header::ACCEPT, expected.accept_header());

    if state.config.forward_origin {
        // Many origin servers reject proxied or missing-referer requests
        let origin = target.origin().ascii_serialization();
        request = request
            .header(header::REFERER, format!("{origin}/"))
            .header(header::ORIGIN, origin);
    }

    if state.config.forward_range
        && let Some(range) = headers.get(header::RANGE)
    {
        // Forwarding Range enables seeking/partial fetch of segments
        request = request.header(header::RANGE, range.clone());
    }

    // Buffered fetches bound the whole body read; streamed fetches only
    // bound time-to-headers so long segment transfers are not cut off.
    let timeout = state.config.upstream_timeout;
    let sent = match mode {
        TransferMode::Buffered => request.timeout(timeout).send().await,
        TransferMode::Streamed => match tokio::time::timeout(timeout, request.send()).await {
            Ok(result) => result,
            Err(_) => {
                metrics::record_upstream_error();
                metrics::record_request("proxy", 500);
                return Err(RelayError::UpstreamTimeout(timeout.as_secs()));
            }
        },
    };

    let upstream = match sent {
        Ok(response) => response,
        Err(e) => {
            metrics::record_upstream_error();
            metrics::record_request("proxy", 500);
            return Err(e.into());
        }
    };

    let status = upstream.status();

    // Upstream error statuses (notably expired links) are relayed as-is,
    // not wrapped in a local error.
    if !status.is_success() {
        warn!("Upstream returned {} for {}", status, target);
        metrics::record_request("proxy", status.as_u16());
        metrics::record_duration("proxy", start);
        return Ok(relay_error_response(upstream).await);
    }

    // Reclassify from actual response headers — upstream truth overrides
    // the URL guess.
    let upstream_content_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let kind = classify::classify(target.as_str(), upstream_content_type.as_deref());

    let response = match kind {
        MediaKind::Manifest => {
            let text = upstream.text().await?;
            let rewritten = rewrite::rewrite(&text, target.as_str());
            manifest_response(status, rewritten)
        }
        MediaKind::SubtitleText => {
            let text = upstream.text().await?;
            subtitle_response(status, upstream_content_type.as_deref(), text)
        }
        MediaKind::SegmentBinary | MediaKind::Other => {
            binary_response(status, kind, upstream_content_type.as_deref(), upstream, mode).await?
        }
    };

    metrics::record_request("proxy", status.as_u16());
    metrics::record_duration("proxy", start);
    Ok(response)
}

fn allow_any_origin(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
}

/// Upstream Content-Type is trusted verbatim when present; otherwise the
/// classified kind supplies a default.
fn content_type_value(upstream_ct: Option<&str>, kind: MediaKind) -> HeaderValue {
    upstream_ct
        .filter(|ct| !ct.trim().is_empty())
        .and_then(|ct| HeaderValue::from_str(ct).ok())
        .unwrap_or_else(|| HeaderValue::from_static(kind.default_content_type()))
}

/// Relay a non-2xx upstream response with its body and content type.
async fn relay_error_response(upstream: reqwest::Response) -> Response {
    let status = upstream.status();
    let content_type = upstream.headers().get(header::CONTENT_TYPE).cloned();
    let body = upstream.bytes().await.unwrap_or_default();

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    if let Some(ct) = content_type {
        response.headers_mut().insert(header::CONTENT_TYPE, ct);
    }
    allow_any_origin(response.headers_mut());
    response
}

fn manifest_response(status: StatusCode, body: String) -> Response {
    let mut response = (status, body).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/vnd.apple.mpegurl"),
    );
    // Live playlists refresh every segment duration
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    allow_any_origin(headers);
    response
}

fn subtitle_response(status: StatusCode, upstream_ct: Option<&str>, body: String) -> Response {
    let content_type = content_type_value(upstream_ct, MediaKind::SubtitleText);
    let mut response = (status, body).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    // Subtitles rarely change but may be corrected
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=3600"),
    );
    allow_any_origin(headers);
    response
}

/// Relay a binary body verbatim, streamed or buffered per transfer mode.
async fn binary_response(
    status: StatusCode,
    kind: MediaKind,
    upstream_ct: Option<&str>,
    upstream: reqwest::Response,
    mode: TransferMode,
) -> Result<Response> {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, content_type_value(upstream_ct, kind));
    // Segments are immutable once published
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=86400"),
    );
    allow_any_origin(&mut headers);

    // Partial-content bookkeeping is relayed so players can seek
    for name in [
        header::CONTENT_LENGTH,
        header::CONTENT_RANGE,
        header::ACCEPT_RANGES,
    ] {
        if let Some(value) = upstream.headers().get(&name) {
            headers.insert(name, value.clone());
        }
    }

    let body = match mode {
        // Dropping the stream on client disconnect cancels the upstream
        // transfer.
        TransferMode::Streamed => Body::from_stream(
            upstream
                .bytes_stream()
                .inspect_err(|e| warn!("Upstream body stream error: {}", e)),
        ),
        TransferMode::Buffered => Body::from(upstream.bytes().await?),
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}
