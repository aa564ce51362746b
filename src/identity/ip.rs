//! Client IP extraction from proxy headers.
//!
//! DESIGN
//! ======
//! The service sits behind a CDN/reverse proxy, so the transport address is
//! rarely the client. A fixed, ordered list of proxy headers is scanned; the
//! first comma-separated value of the first header present wins. Extraction
//! is total: it always produces a string, falling back to loopback outside
//! production and to the literal `"unknown"` as the last resort, so IP-keyed
//! lookups never fail.

use std::net::IpAddr;

use axum::http::HeaderMap;

/// Fallback key when no usable address exists at all.
pub const UNKNOWN_IP: &str = "unknown";

const LOOPBACK_IP: &str = "127.0.0.1";

/// Proxy headers in trust order. First present header wins.
const PROXY_IP_HEADERS: &[&str] = &[
    "x-forwarded-for",
    "x-real-ip",
    "x-client-ip",
    "cf-connecting-ip",
    "x-forwarded",
    "forwarded-for",
    "forwarded",
];

/// Validate a candidate as a literal IPv4 or IPv6 address.
///
/// Delegates to `std::net::IpAddr` parsing, which already enforces the
/// 0–255 octet rule for IPv4 and full grammar for IPv6.
#[must_use]
pub fn is_valid_ip(candidate: &str) -> bool {
    candidate.parse::<IpAddr>().is_ok()
}

/// Extract the client IP from request headers.
///
/// Scans `PROXY_IP_HEADERS` in order and takes the first comma-separated
/// value of the first header present, validated as IPv4/IPv6. Falls back to
/// `remote_addr` (the transport peer), then loopback outside production,
/// then [`UNKNOWN_IP`]. Never fails.
#[must_use]
pub fn client_ip(headers: &HeaderMap, remote_addr: Option<IpAddr>, production: bool) -> String {
    for name in PROXY_IP_HEADERS {
        let Some(value) = headers.get(*name).and_then(|v| v.to_str().ok()) else {
            continue;
        };
        let Some(first) = value.split(',').next() else {
            continue;
        };
        let candidate = first.trim();
        if is_valid_ip(candidate) {
            return candidate.to_owned();
        }
    }

    if let Some(addr) = remote_addr {
        return addr.to_string();
    }

    if production {
        UNKNOWN_IP.to_owned()
    } else {
        LOOPBACK_IP.to_owned()
    }
}

#[cfg(test)]
#[path = "ip_test.rs"]
mod tests;
