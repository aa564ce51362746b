//! Identifier validation — email and session-id normalizers.
//!
//! DESIGN
//! ======
//! Validators return `Option<String>`: a malformed identifier is treated as
//! absent, never as a hard failure. The request continues with whatever
//! identifiers remain, so a bad email can never block the usage check or be
//! used as a ledger key (malformed strings as keys would open the counter map
//! to collision games).

/// Domains whose addresses are rejected outright. Throwaway inboxes defeat
/// the email tier entirely, so they never qualify as identifiers.
const BLOCKED_EMAIL_DOMAINS: &[&str] = &[
    "mailinator.com",
    "guerrillamail.com",
    "10minutemail.com",
    "tempmail.com",
    "temp-mail.org",
    "throwawaymail.com",
    "yopmail.com",
    "trashmail.com",
    "getnada.com",
    "sharklasers.com",
];

const SESSION_ID_MIN_LEN: usize = 8;
const SESSION_ID_MAX_LEN: usize = 64;

/// Normalize and validate an email address for use as an identifier.
///
/// Trims, lower-cases, and enforces structure: exactly one `@`, non-empty
/// local part and domain, a dot in the domain, no whitespace. `+`-aliasing is
/// rejected (one inbox would otherwise mint unlimited identities), as are
/// known throwaway domains.
#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    if normalized.is_empty() || normalized.len() > 254 {
        return None;
    }
    if normalized.chars().any(char::is_whitespace) {
        return None;
    }

    let (local, domain) = normalized.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    if local.contains('+') {
        return None;
    }
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return None;
    }
    if BLOCKED_EMAIL_DOMAINS.contains(&domain) {
        return None;
    }

    Some(normalized)
}

/// Validate a client-supplied session id: strictly alphanumeric, 8–64 chars.
#[must_use]
pub fn normalize_session_id(session_id: &str) -> Option<String> {
    let trimmed = session_id.trim();
    if trimmed.len() < SESSION_ID_MIN_LEN || trimmed.len() > SESSION_ID_MAX_LEN {
        return None;
    }
    if !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(trimmed.to_owned())
}

#[cfg(test)]
#[path = "validate_test.rs"]
mod tests;
