use super::*;

const WINDOW: u64 = 86_400;
const GRACE: u64 = 3_600;
const T0: u64 = 1_000_000;

fn tracker() -> AbuseTracker {
    AbuseTracker::new(3, WINDOW, GRACE)
}

// =============================================================================
// identifier collision
// =============================================================================

#[test]
fn collision_flagged_at_ip_threshold() {
    let t = tracker();
    t.record_observation("dev1", "203.0.113.1", T0);
    t.record_observation("dev1", "203.0.113.2", T0 + 10);
    assert_eq!(t.summary().identifier_collisions, 0);

    t.record_observation("dev1", "203.0.113.3", T0 + 20);
    let summary = t.summary();
    assert_eq!(summary.identifier_collisions, 1);
    assert_eq!(summary.suspicious_identities, vec!["dev1".to_owned()]);
}

#[test]
fn collision_flagged_once_per_window() {
    let t = tracker();
    for i in 1..=5 {
        t.record_observation("dev1", &format!("203.0.113.{i}"), T0 + i);
    }
    assert_eq!(t.summary().identifier_collisions, 1);
}

#[test]
fn same_ip_repeated_never_flags() {
    let t = tracker();
    for i in 0..10 {
        t.record_observation("dev1", "203.0.113.1", T0 + i);
    }
    assert_eq!(t.summary().identifier_collisions, 0);
}

#[test]
fn observation_window_rolls_over() {
    let t = tracker();
    t.record_observation("dev1", "203.0.113.1", T0);
    t.record_observation("dev1", "203.0.113.2", T0);

    // Past the window the IP set restarts, so two more IPs don't flag.
    let later = T0 + WINDOW + 1;
    t.record_observation("dev1", "203.0.113.3", later);
    t.record_observation("dev1", "203.0.113.4", later);
    assert_eq!(t.summary().identifier_collisions, 0);
}

#[test]
fn unknown_ip_ignored() {
    let t = tracker();
    t.record_observation("dev1", "unknown", T0);
    t.record_observation("dev1", "", T0);
    assert!(t.recent_records(10).is_empty());
}

// =============================================================================
// rapid reset
// =============================================================================

#[test]
fn rapid_reset_within_grace_is_recorded() {
    let t = tracker();
    let expired_at = T0;
    t.record_rapid_reset("email:abc", 5, expired_at, 5, expired_at + 60);
    let summary = t.summary();
    assert_eq!(summary.rapid_resets, 1);
    assert_eq!(summary.suspicious_identities, vec!["email:abc".to_owned()]);
}

#[test]
fn rapid_reset_recorded_once_per_expired_window() {
    let t = tracker();
    // A denied client polling the check endpoint hits this repeatedly; only
    // the first observation of the window lands in the log.
    for i in 0..200 {
        t.record_rapid_reset("email:abc", 5, T0, 5, T0 + i);
    }
    assert_eq!(t.summary().rapid_resets, 1);
    assert_eq!(t.recent_records(10).len(), 1);

    // The next exhausted window is a fresh signal.
    t.record_rapid_reset("email:abc", 5, T0 + WINDOW, 5, T0 + WINDOW + 60);
    assert_eq!(t.summary().rapid_resets, 2);
}

#[test]
fn prune_clears_rapid_reset_flag_past_grace() {
    let t = tracker();
    t.record_rapid_reset("k", 5, T0, 5, T0 + 1);
    t.prune(T0 + GRACE + 1);

    // Same key, later window, still records after the flag was pruned.
    t.record_rapid_reset("k", 5, T0 + WINDOW, 5, T0 + WINDOW + 1);
    assert_eq!(t.summary().rapid_resets, 2);
}

#[test]
fn return_after_grace_is_not_suspicious() {
    let t = tracker();
    t.record_rapid_reset("k", 5, T0, 5, T0 + GRACE + 1);
    assert_eq!(t.summary().rapid_resets, 0);
}

#[test]
fn non_exhausted_window_is_not_suspicious() {
    let t = tracker();
    t.record_rapid_reset("k", 2, T0, 5, T0 + 60);
    assert_eq!(t.summary().rapid_resets, 0);
}

// =============================================================================
// summary / prune
// =============================================================================

#[test]
fn summary_dedups_and_caps_identities() {
    let t = tracker();
    for i in 0..150 {
        t.record_rapid_reset(&format!("key{i}"), 5, T0, 5, T0 + 1);
        // Same key in a later window should appear once in the identity list.
        t.record_rapid_reset(&format!("key{i}"), 5, T0 + WINDOW, 5, T0 + WINDOW + 2);
    }
    let summary = t.summary();
    assert_eq!(summary.rapid_resets, 300);
    assert_eq!(summary.suspicious_identities.len(), 100);
}

#[test]
fn recent_records_returns_newest() {
    let t = tracker();
    t.record_rapid_reset("first", 5, T0, 5, T0 + 1);
    t.record_rapid_reset("second", 5, T0, 5, T0 + 2);
    let records = t.recent_records(1);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].key, "second");
}

#[test]
fn prune_drops_stale_device_windows_but_keeps_records() {
    let t = tracker();
    for i in 1..=3 {
        t.record_observation("dev1", &format!("203.0.113.{i}"), T0);
    }
    assert_eq!(t.summary().identifier_collisions, 1);

    t.prune(T0 + WINDOW + 1);
    // Device window gone; the appended record survives as audit trail.
    assert_eq!(t.summary().identifier_collisions, 1);
    assert_eq!(t.recent_records(10).len(), 1);

    // A fresh window on the same device can flag again after pruning.
    for i in 4..=6 {
        t.record_observation("dev1", &format!("203.0.113.{i}"), T0 + WINDOW + 10);
    }
    assert_eq!(t.summary().identifier_collisions, 2);
}
