//! Line-based M3U8 playlist rewriting.
//!
//! Every URL reference in a manifest — bare absolute URLs, relative segment
//! filenames, and quoted `URI="..."` tag attributes — is replaced with a
//! proxy-routed reference so the player keeps coming back through us.
//! Everything else passes through byte-for-byte: unknown directives must
//! never be corrupted, so passthrough is the default for anything not
//! positively recognized.

use tracing::warn;
use url::Url;

/// Extensions a bare relative line must carry to be treated as a URL
/// reference. Plain text lines without one of these pass through.
const MEDIA_EXTENSIONS: [&str; 7] = ["m3u8", "ts", "vtt", "srt", "ass", "mp4", "m4v"];

/// Classification of a single manifest line.
///
/// Ordered predicates, evaluated top to bottom, first match wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlaylistLine {
    /// Blank line or `#` tag with no quoted URI attribute
    CommentOrBlank,
    /// `#EXT-X-...` tag embedding a quoted `URI="..."` (init segments,
    /// alternate renditions, keys)
    AttributeTagUri,
    /// A bare absolute `http://` or `https://` URL on its own line
    AbsoluteUrl,
    /// A bare relative reference with a recognized media extension
    RelativeUrl,
    /// Anything else — left untouched
    Passthrough,
}

fn classify_line(line: &str) -> PlaylistLine {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return PlaylistLine::CommentOrBlank;
    }
    if trimmed.starts_with('#') {
        if trimmed.contains("URI=\"") {
            return PlaylistLine::AttributeTagUri;
        }
        return PlaylistLine::CommentOrBlank;
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return PlaylistLine::AbsoluteUrl;
    }
    if has_media_extension(trimmed) {
        return PlaylistLine::RelativeUrl;
    }
    PlaylistLine::Passthrough
}

fn has_media_extension(reference: &str) -> bool {
    let path = reference.split(['?', '#']).next().unwrap_or(reference);
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rsplit_once('.') {
        Some((_, ext)) => MEDIA_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
        None => false,
    }
}

/// Build a proxy-routed reference for a fully resolved absolute URL.
fn proxy_reference(absolute: &str) -> String {
    format!("/proxy?url={}", urlencoding::encode(absolute))
}

/// Rewrite every URL reference in `manifest` to route through the proxy.
///
/// `original_url` is the absolute URL the manifest was fetched from;
/// relative references resolve as siblings of it. If the base URL does not
/// parse, the manifest is returned unchanged — a broken rewrite must never
/// produce a worse result than no rewrite, and no error escapes this
/// boundary.
///
/// Non-rewritten lines (comments, blanks, unknown directives) are preserved
/// byte-for-byte, as is the input's newline convention.
pub fn rewrite(manifest: &str, original_url: &str) -> String {
    let base = match Url::parse(original_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => url,
        _ => {
            warn!("Unusable base URL for playlist rewrite, passing manifest through");
            return manifest.to_string();
        }
    };

    let rewritten: Vec<String> = manifest
        .split('\n')
        .map(|raw| {
            // Carry a CRLF terminator through rewrites unchanged
            let (line, cr) = match raw.strip_suffix('\r') {
                Some(stripped) => (stripped, "\r"),
                None => (raw, ""),
            };
            match rewrite_line(line, &base) {
                Some(replaced) => format!("{replaced}{cr}"),
                None => raw.to_string(),
            }
        })
        .collect();

    rewritten.join("\n")
}

/// Rewrite a single line, or `None` to pass it through byte-identical.
fn rewrite_line(line: &str, base: &Url) -> Option<String> {
    match classify_line(line) {
        PlaylistLine::CommentOrBlank | PlaylistLine::Passthrough => None,
        PlaylistLine::AttributeTagUri => rewrite_uri_attribute(line, base),
        PlaylistLine::AbsoluteUrl => {
            let url = Url::parse(line.trim()).ok()?;
            Some(proxy_reference(url.as_str()))
        }
        PlaylistLine::RelativeUrl => {
            // Url::join resolves the reference as a sibling of the manifest
            let resolved = base.join(line.trim()).ok()?;
            Some(proxy_reference(resolved.as_str()))
        }
    }
}

/// Replace only the quoted `URI="..."` value inside a tag line, leaving the
/// surrounding attributes intact.
fn rewrite_uri_attribute(line: &str, base: &Url) -> Option<String> {
    let start = line.find("URI=\"")? + "URI=\"".len();
    let end = start + line[start..].find('"')?;
    let reference = &line[start..end];

    // Absolute references pass through resolution unchanged; relatives join
    // onto the manifest's directory.
    let resolved = base.join(reference).ok()?;

    Some(format!(
        "{}{}{}",
        &line[..start],
        proxy_reference(resolved.as_str()),
        &line[end..]
    ))
}
