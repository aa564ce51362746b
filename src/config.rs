//! Typed service configuration parsed from environment variables.
//!
//! DESIGN
//! ======
//! All policy knobs are external configuration, not core logic: the free
//! conversation limit, window length, bypass lists, and abuse thresholds are
//! read once at startup into an immutable `LimitConfig` shared via
//! `AppState`. Parse failures fall back to defaults rather than aborting —
//! a mistyped knob should not take the demo down.

const DEFAULT_FREE_LIMIT: u32 = 5;
const DEFAULT_WINDOW_HOURS: u64 = 24;
const DEFAULT_ABUSE_IP_THRESHOLD: usize = 3;
const DEFAULT_RAPID_RESET_GRACE_SECS: u64 = 3_600;

/// The developer-bypass literal. Honored only outside production; lets local
/// clients opt out of metering without touching env config.
pub const DEV_BYPASS_ID: &str = "dev-local-bypass";

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn parse_email_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter_map(crate::identity::validate::normalize_email)
        .collect()
}

#[derive(Debug, Clone)]
pub struct LimitConfig {
    /// Free conversations per window for anonymous users.
    pub free_limit: u32,
    /// Usage window length in seconds.
    pub window_secs: u64,
    /// Normalized emails that always bypass the limit.
    pub admin_emails: Vec<String>,
    /// Distinct IPs per device per window before a collision is flagged.
    pub abuse_ip_threshold: usize,
    /// Seconds after window expiry within which a return is a rapid reset.
    pub rapid_reset_grace_secs: u64,
    /// Token required by the admin surface. Surface is disabled when unset.
    pub admin_token: Option<String>,
    /// Production mode: no loopback IP fallback, developer bypass ignored.
    pub production: bool,
}

impl LimitConfig {
    /// Build config from environment variables.
    ///
    /// - `FREE_CONVERSATION_LIMIT`: default 5
    /// - `USAGE_WINDOW_HOURS`: default 24
    /// - `ADMIN_EMAILS`: comma-separated, validated like any email identifier
    /// - `ABUSE_IP_THRESHOLD`: default 3
    /// - `RAPID_RESET_GRACE_SECS`: default 3600
    /// - `ADMIN_TOKEN`: unset disables the admin surface
    /// - `APP_ENV`: `production` enables production behavior
    #[must_use]
    pub fn from_env() -> Self {
        let window_hours = env_parse("USAGE_WINDOW_HOURS", DEFAULT_WINDOW_HOURS);
        let admin_emails = std::env::var("ADMIN_EMAILS")
            .map(|raw| parse_email_list(&raw))
            .unwrap_or_default();
        let admin_token = std::env::var("ADMIN_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());
        let production = std::env::var("APP_ENV")
            .map(|v| v.trim().eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        Self {
            free_limit: env_parse("FREE_CONVERSATION_LIMIT", DEFAULT_FREE_LIMIT),
            window_secs: window_hours * 3_600,
            admin_emails,
            abuse_ip_threshold: env_parse("ABUSE_IP_THRESHOLD", DEFAULT_ABUSE_IP_THRESHOLD),
            rapid_reset_grace_secs: env_parse(
                "RAPID_RESET_GRACE_SECS",
                DEFAULT_RAPID_RESET_GRACE_SECS,
            ),
            admin_token,
            production,
        }
    }

    /// Defaults without touching the environment. Used by tests.
    #[cfg(test)]
    #[must_use]
    pub fn for_tests() -> Self {
        Self {
            free_limit: DEFAULT_FREE_LIMIT,
            window_secs: DEFAULT_WINDOW_HOURS * 3_600,
            admin_emails: Vec::new(),
            abuse_ip_threshold: DEFAULT_ABUSE_IP_THRESHOLD,
            rapid_reset_grace_secs: DEFAULT_RAPID_RESET_GRACE_SECS,
            admin_token: None,
            production: false,
        }
    }

    /// Is this (normalized) email on the admin bypass list?
    #[must_use]
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails.iter().any(|a| a == email)
    }

    /// Does this session id invoke the developer bypass? Never matches in
    /// production.
    #[must_use]
    pub fn is_dev_bypass(&self, session_id: &str) -> bool {
        !self.production && session_id == DEV_BYPASS_ID
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
