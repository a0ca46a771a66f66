use crate::error::RelayError;
use std::net::{Ipv4Addr, Ipv6Addr};
use url::{Host, Url};

/// Validate a user-supplied target URL and return it parsed.
///
/// Accepts only absolute `http://` and `https://` URLs. Unless
/// `allow_private` is set (dev/test), IP-literal hosts in private or
/// reserved ranges are rejected — the proxy fetches arbitrary URLs on
/// behalf of clients, so this is the SSRF boundary.
///
/// Hostnames are accepted without DNS resolution; DNS rebinding is a known
/// limitation, full mitigation would need an async resolver check.
///
/// # Errors
/// Returns [`RelayError::InvalidTarget`] for relative or unparseable URLs,
/// non-HTTP(S) schemes, missing hosts, and blocked IP ranges.
pub fn validate_target_url(target: &str, allow_private: bool) -> Result<Url, RelayError> {
    let parsed = Url::parse(target)
        .map_err(|_| RelayError::InvalidTarget(format!("Not an absolute URL: {target}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(RelayError::InvalidTarget(format!(
                "Scheme '{scheme}' not allowed — only http/https permitted"
            )));
        }
    }

    let host = parsed
        .host()
        .ok_or_else(|| RelayError::InvalidTarget(format!("No host in URL: {target}")))?;

    if !allow_private {
        match host {
            Host::Ipv4(ip) if is_blocked_ipv4(ip) => {
                return Err(RelayError::InvalidTarget(format!(
                    "Private or reserved IPv4 address not allowed: {ip}"
                )));
            }
            Host::Ipv6(ip) if is_blocked_ipv6(ip) => {
                return Err(RelayError::InvalidTarget(format!(
                    "Private or reserved IPv6 address not allowed: {ip}"
                )));
            }
            // Hostnames pass — we cannot resolve them without async DNS
            _ => {}
        }
    }

    Ok(parsed)
}

/// Returns `true` for IPv4 addresses in private or reserved ranges.
///
/// Blocked: `0.0.0.0/8`, RFC 1918 (`10/8`, `172.16/12`, `192.168/16`),
/// loopback `127/8`, and link-local/cloud-metadata `169.254/16`.
fn is_blocked_ipv4(ip: Ipv4Addr) -> bool {
    let octets = ip.octets();
    let (a, b) = (octets[0], octets[1]);

    a == 0
        || a == 10
        || a == 127
        || (a == 169 && b == 254)
        || (a == 172 && (16..=31).contains(&b))
        || (a == 192 && b == 168)
}

/// Returns `true` for IPv6 loopback, link-local (`fe80::/10`), and
/// unique-local (`fc00::/7`) addresses.
fn is_blocked_ipv6(ip: Ipv6Addr) -> bool {
    let s = ip.segments();

    ip.is_loopback() || (s[0] & 0xffc0) == 0xfe80 || (s[0] & 0xfe00) == 0xfc00
}
