//! Device fingerprinting and persistent-id tokens.
//!
//! DESIGN
//! ======
//! The fingerprint reduces a fixed bundle of client-observable signals to a
//! short string with an order-sensitive rolling hash (`h = h*31 + codepoint`,
//! truncated to 32 bits, rendered base-36). Clients that compute the hash
//! themselves send the opaque string; clients that cannot send the raw
//! signal bundle and the server derives it with the same algorithm.
//!
//! TRADE-OFFS
//! ==========
//! This is a best-effort device signal, not a security boundary: clearing
//! storage or switching browsers resets it. That is an accepted property of
//! a free-demo deterrent, not a bug.

use std::fmt::Write;

use rand::Rng;
use serde::Deserialize;

const PERSISTENT_ID_BYTES: usize = 16;

/// Client-observable signals collected by the browser, sent as JSON.
///
/// Every field is optional; absent signals hash as empty strings so partial
/// bundles still produce a stable fingerprint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceSignals {
    /// Screen geometry and color depth, e.g. `"1920x1080x24"`.
    #[serde(default)]
    pub screen: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Device memory in GB as reported by the browser.
    #[serde(default)]
    pub device_memory: Option<f64>,
    #[serde(default)]
    pub hardware_concurrency: Option<u32>,
    #[serde(default)]
    pub touch_points: Option<u32>,
    #[serde(default)]
    pub cookies_enabled: Option<bool>,
    #[serde(default)]
    pub do_not_track: Option<bool>,
    /// Hash of a canvas rendering pass.
    #[serde(default)]
    pub canvas_hash: Option<String>,
    /// WebGL renderer/vendor string.
    #[serde(default)]
    pub webgl: Option<String>,
}

/// Order-sensitive rolling hash: `h = h*31 + codepoint`, wrapping at 32 bits,
/// rendered lowercase base-36.
#[must_use]
pub fn rolling_hash(input: &str) -> String {
    let mut hash: u32 = 0;
    for ch in input.chars() {
        hash = hash.wrapping_mul(31).wrapping_add(ch as u32);
    }
    to_base36(hash)
}

fn to_base36(mut value: u32) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_owned();
    }
    let mut buf = [0u8; 7];
    let mut i = buf.len();
    while value > 0 {
        i -= 1;
        buf[i] = DIGITS[(value % 36) as usize];
        value /= 36;
    }
    String::from_utf8_lossy(&buf[i..]).into_owned()
}

/// Reduce a signal bundle to a fingerprint string.
///
/// The concatenation order is fixed; changing it changes every fingerprint.
#[must_use]
pub fn fingerprint(signals: &DeviceSignals) -> String {
    let mut joined = String::new();
    let mut push = |part: &str| {
        joined.push_str(part);
        joined.push('|');
    };

    push(signals.screen.as_deref().unwrap_or(""));
    push(signals.timezone.as_deref().unwrap_or(""));
    push(signals.language.as_deref().unwrap_or(""));
    push(signals.platform.as_deref().unwrap_or(""));
    push(signals.user_agent.as_deref().unwrap_or(""));
    push(&signals.device_memory.map(|v| v.to_string()).unwrap_or_default());
    push(&signals.hardware_concurrency.map(|v| v.to_string()).unwrap_or_default());
    push(&signals.touch_points.map(|v| v.to_string()).unwrap_or_default());
    push(&signals.cookies_enabled.map(|v| v.to_string()).unwrap_or_default());
    push(&signals.do_not_track.map(|v| v.to_string()).unwrap_or_default());
    push(signals.canvas_hash.as_deref().unwrap_or(""));
    push(signals.webgl.as_deref().unwrap_or(""));

    rolling_hash(&joined)
}

/// Combine a fingerprint and a persistent id into one device key using the
/// same rolling hash. Either part may be empty when absent.
#[must_use]
pub fn device_key(fingerprint: &str, persistent_id: &str) -> String {
    rolling_hash(&format!("{fingerprint}:{persistent_id}"))
}

/// Generate a random persistent-id token (16 bytes, hex).
///
/// Issued once and cached in client-side durable storage; the client
/// regenerates it if storage is unavailable or cleared.
#[must_use]
pub fn generate_persistent_id() -> String {
    let bytes: [u8; PERSISTENT_ID_BYTES] = rand::rng().random();
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

#[cfg(test)]
#[path = "fingerprint_test.rs"]
mod tests;
