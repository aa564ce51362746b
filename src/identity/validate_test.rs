use super::*;

// =============================================================================
// normalize_email
// =============================================================================

#[test]
fn email_basic_is_normalized() {
    assert_eq!(
        normalize_email("  User@Example.COM  "),
        Some("user@example.com".to_owned())
    );
}

#[test]
fn email_plus_aliasing_rejected() {
    assert_eq!(normalize_email("test+abuse@example.com"), None);
}

#[test]
fn email_throwaway_domain_rejected() {
    assert_eq!(normalize_email("someone@mailinator.com"), None);
    assert_eq!(normalize_email("someone@YOPMAIL.com"), None);
}

#[test]
fn email_structural_failures_rejected() {
    assert_eq!(normalize_email(""), None);
    assert_eq!(normalize_email("no-at-sign"), None);
    assert_eq!(normalize_email("@example.com"), None);
    assert_eq!(normalize_email("user@"), None);
    assert_eq!(normalize_email("user@@example.com"), None);
    assert_eq!(normalize_email("user@nodot"), None);
    assert_eq!(normalize_email("user@.example.com"), None);
    assert_eq!(normalize_email("user@example.com."), None);
    assert_eq!(normalize_email("user name@example.com"), None);
}

#[test]
fn email_overlong_rejected() {
    let local = "a".repeat(250);
    assert_eq!(normalize_email(&format!("{local}@example.com")), None);
}

// =============================================================================
// normalize_session_id
// =============================================================================

#[test]
fn session_id_valid_range() {
    assert_eq!(
        normalize_session_id("abcd1234"),
        Some("abcd1234".to_owned())
    );
    let max = "a".repeat(64);
    assert_eq!(normalize_session_id(&max), Some(max.clone()));
}

#[test]
fn session_id_too_short_or_long_rejected() {
    assert_eq!(normalize_session_id("abc123"), None);
    assert_eq!(normalize_session_id(&"a".repeat(65)), None);
}

#[test]
fn session_id_non_alphanumeric_rejected() {
    assert_eq!(normalize_session_id("abcd-1234"), None);
    assert_eq!(normalize_session_id("abcd_1234"), None);
    assert_eq!(normalize_session_id("abcd 1234"), None);
    assert_eq!(normalize_session_id("abcd12é4x"), None);
}

#[test]
fn session_id_trimmed() {
    assert_eq!(
        normalize_session_id("  abcd1234  "),
        Some("abcd1234".to_owned())
    );
}
