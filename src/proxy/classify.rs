//! Content classification for proxied resources.
//!
//! Decides what a fetched resource logically is (manifest, segment,
//! subtitle) from its URL and/or upstream response headers, and which
//! transfer mode the pipeline should use for it. Pure functions, no I/O.

/// Logical media type of a proxied resource.
///
/// Derived per request from the upstream `Content-Type` header (which takes
/// precedence when present and non-empty) or from the URL's file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// HLS playlist (M3U8) — body is rewritten before relaying
    Manifest,
    /// Binary media segment (TS/fMP4) — relayed byte-for-byte
    SegmentBinary,
    /// Subtitle text (WebVTT, SRT, ASS/SSA) — relayed as text
    SubtitleText,
    /// Anything else — relayed byte-for-byte as octet-stream
    Other,
}

/// How the upstream body is carried to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// Body fully materialized in memory (required for line-based rewriting
    /// and charset-safe text decoding)
    Buffered,
    /// Body relayed incrementally as bytes arrive, bounding memory and
    /// supporting partial-content transfers
    Streamed,
}

impl MediaKind {
    /// Transfer mode decision: text kinds must be buffered, everything else
    /// streams through.
    pub fn transfer_mode(self) -> TransferMode {
        match self {
            MediaKind::Manifest | MediaKind::SubtitleText => TransferMode::Buffered,
            MediaKind::SegmentBinary | MediaKind::Other => TransferMode::Streamed,
        }
    }

    /// Accept header tuned to the expected kind, sent on the outbound fetch.
    pub fn accept_header(self) -> &'static str {
        match self {
            MediaKind::Manifest => "application/vnd.apple.mpegurl, application/x-mpegurl, */*",
            MediaKind::SegmentBinary => "video/mp2t, video/mp4, */*",
            MediaKind::SubtitleText => "text/vtt, text/plain, */*",
            MediaKind::Other => "*/*",
        }
    }

    /// Outgoing Content-Type when the upstream response did not carry one.
    pub fn default_content_type(self) -> &'static str {
        match self {
            MediaKind::Manifest => "application/vnd.apple.mpegurl",
            MediaKind::SegmentBinary => "video/mp2t",
            MediaKind::SubtitleText => "text/vtt; charset=utf-8",
            MediaKind::Other => "application/octet-stream",
        }
    }
}

/// Classify a resource from its URL and optional `Content-Type` header.
///
/// A present, non-empty header wins over the URL pattern. Unrecognized
/// header values fall back to URL inference for routing purposes (the raw
/// header value is still relayed verbatim by the pipeline). Never panics;
/// unmatched input classifies as [`MediaKind::Other`].
pub fn classify(url: &str, content_type: Option<&str>) -> MediaKind {
    if let Some(ct) = content_type {
        let essence = ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        if !essence.is_empty() {
            match essence.as_str() {
                "application/vnd.apple.mpegurl"
                | "application/x-mpegurl"
                | "audio/mpegurl"
                | "audio/x-mpegurl" => return MediaKind::Manifest,
                "video/mp2t" | "video/mp4" => return MediaKind::SegmentBinary,
                "text/vtt" | "text/plain" | "text/x-ass" => return MediaKind::SubtitleText,
                // Present but unrecognized: route by URL instead
                _ => {}
            }
        }
    }
    classify_by_url(url)
}

/// Classify from the URL's file extension alone (pre-fetch guess).
///
/// Case-insensitive, tolerates a trailing query string or fragment.
pub fn classify_by_url(url: &str) -> MediaKind {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let name = path.rsplit('/').next().unwrap_or(path);
    let Some((_, ext)) = name.rsplit_once('.') else {
        return MediaKind::Other;
    };

    match ext.to_ascii_lowercase().as_str() {
        "m3u8" => MediaKind::Manifest,
        "ts" | "m2ts" | "mp4" | "m4v" => MediaKind::SegmentBinary,
        "vtt" | "srt" | "ass" | "ssa" => MediaKind::SubtitleText,
        _ => MediaKind::Other,
    }
}
