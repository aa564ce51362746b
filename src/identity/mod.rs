//! Identity resolution — turning raw request signals into a ledger key.
//!
//! ARCHITECTURE
//! ============
//! Requests arrive with whatever identifiers the client could supply
//! (cookies are disabled by design to resist trivial resets). This module
//! validates each signal independently, then selects exactly one composite
//! key by fixed precedence:
//!
//!   verified email  >  fingerprint+persistent-id  >  ip+user-agent  >  unknown
//!
//! Selection is a pure function of the validated set: the same inputs always
//! produce the same key, and invalid inputs are treated as absent rather than
//! rejected requests.

pub mod fingerprint;
pub mod ip;
pub mod validate;

use std::net::IpAddr;

use axum::http::HeaderMap;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::identity::fingerprint::DeviceSignals;

const USER_AGENT_KEY_LEN: usize = 32;

/// Raw client-supplied identity fields, straight from the request body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawIdentity {
    #[serde(default)]
    pub email: Option<String>,
    /// Precomputed fingerprint hash. Ignored when `signals` is present.
    #[serde(default)]
    pub fingerprint: Option<String>,
    /// Raw signal bundle; the server derives the fingerprint from it.
    #[serde(default)]
    pub signals: Option<DeviceSignals>,
    #[serde(default)]
    pub persistent_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Validated identifier set for one request. Every field is either valid or
/// absent; `ip` and `user_agent` are always present (with fallbacks).
#[derive(Debug, Clone)]
pub struct Identifiers {
    pub email: Option<String>,
    pub fingerprint: Option<String>,
    pub persistent_id: Option<String>,
    pub session_id: Option<String>,
    pub ip: String,
    pub user_agent: String,
}

impl Identifiers {
    /// Composite device hash, present when either device signal is.
    #[must_use]
    pub fn device_key(&self) -> Option<String> {
        if self.fingerprint.is_none() && self.persistent_id.is_none() {
            return None;
        }
        Some(fingerprint::device_key(
            self.fingerprint.as_deref().unwrap_or(""),
            self.persistent_id.as_deref().unwrap_or(""),
        ))
    }

    /// True when no client-side identifier survived validation and the IP is
    /// the unknown fallback.
    #[must_use]
    pub fn is_anonymous_fallback(&self) -> bool {
        self.email.is_none()
            && self.fingerprint.is_none()
            && self.persistent_id.is_none()
            && self.ip == ip::UNKNOWN_IP
    }
}

/// Resolve raw request data into a validated identifier set.
///
/// Each signal passes through its validator; failures mean "absent". The IP
/// comes from proxy headers, falling back to the transport peer address and
/// then the chain in [`ip::client_ip`].
#[must_use]
pub fn resolve(
    headers: &HeaderMap,
    remote_addr: Option<IpAddr>,
    raw: &RawIdentity,
    production: bool,
) -> Identifiers {
    let email = raw.email.as_deref().and_then(validate::normalize_email);
    let session_id = raw
        .session_id
        .as_deref()
        .and_then(validate::normalize_session_id);

    // Raw signals outrank a precomputed hash: the server-side derivation is
    // the canonical one when both are supplied.
    let fp = match (&raw.signals, &raw.fingerprint) {
        (Some(signals), _) => Some(fingerprint::fingerprint(signals)),
        (None, Some(precomputed)) => {
            let trimmed = precomputed.trim();
            (!trimmed.is_empty() && trimmed.len() <= 64).then(|| trimmed.to_owned())
        }
        (None, None) => None,
    };

    let persistent_id = raw.persistent_id.as_deref().and_then(|pid| {
        let trimmed = pid.trim();
        (!trimmed.is_empty() && trimmed.len() <= 64).then(|| trimmed.to_owned())
    });

    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_owned();

    Identifiers {
        email,
        fingerprint: fp,
        persistent_id,
        session_id,
        ip: ip::client_ip(headers, remote_addr, production),
        user_agent,
    }
}

/// Select the single ledger key for this identifier set.
///
/// Precedence: email (survives all client-side resets) > device composite >
/// ip+user-agent > the literal unknown key. Email keys are digested so raw
/// addresses never appear as map keys or in logs.
#[must_use]
pub fn ledger_key(identifiers: &Identifiers) -> String {
    if let Some(email) = &identifiers.email {
        return format!("email:{}", sha256_hex(email));
    }
    if let Some(device) = identifiers.device_key() {
        return format!("device:{device}");
    }
    if identifiers.ip != ip::UNKNOWN_IP {
        let ua: String = identifiers.user_agent.chars().take(USER_AGENT_KEY_LEN).collect();
        return format!("ip:{}|ua:{ua}", identifiers.ip);
    }
    ip::UNKNOWN_IP.to_owned()
}

pub(crate) fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let bytes = hasher.finalize();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
