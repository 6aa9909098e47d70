//! Configuration loading from environment variables.
//!
//! Invalid values fall back to defaults with a warning; configuration never
//! aborts startup.

use std::str::FromStr;

use crate::password::PasswordPolicy;
use crate::store::LockoutOptions;

pub const DATABASE_URL: &str = "DATABASE_URL";
pub const MAX_FAILED_ACCESS: &str = "WARDEN_MAX_FAILED_ACCESS";
pub const LOCKOUT_SECONDS: &str = "WARDEN_LOCKOUT_SECONDS";
pub const PASSWORD_MIN_LENGTH: &str = "WARDEN_PASSWORD_MIN_LENGTH";

/// Settings handed to store constructors at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfraConfig {
    /// Postgres connection string; `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub password_policy: PasswordPolicy,
    pub lockout: LockoutOptions,
}

impl Default for InfraConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            password_policy: PasswordPolicy::default(),
            lockout: LockoutOptions::default(),
        }
    }
}

impl InfraConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the process environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let database_url = lookup(DATABASE_URL)
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        let max_failed = parse_or(&lookup, MAX_FAILED_ACCESS, defaults.lockout.max_failed_access_attempts);
        let lockout_secs = parse_or(&lookup, LOCKOUT_SECONDS, defaults.lockout.lockout_duration.num_seconds());
        let lockout_duration = lockout_duration_or(lockout_secs, defaults.lockout.lockout_duration);
        let min_length = parse_or(&lookup, PASSWORD_MIN_LENGTH, defaults.password_policy.required_length);

        Self {
            database_url,
            password_policy: PasswordPolicy {
                required_length: min_length,
                ..defaults.password_policy
            },
            lockout: LockoutOptions {
                max_failed_access_attempts: max_failed,
                lockout_duration,
            },
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Copy + core::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, default = %default, "invalid config value; using default");
            default
        }),
        None => default,
    }
}

/// Negative or out-of-range lockout lengths fall back to the default.
fn lockout_duration_or(secs: i64, default: chrono::Duration) -> chrono::Duration {
    match chrono::Duration::try_seconds(secs) {
        Some(duration) if secs >= 0 => duration,
        _ => {
            tracing::warn!(
                key = LOCKOUT_SECONDS,
                value = secs,
                default = default.num_seconds(),
                "lockout duration out of range; using default"
            );
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> InfraConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        InfraConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_yields_defaults() {
        assert_eq!(config(&[]), InfraConfig::default());
    }

    #[test]
    fn values_are_read_from_lookup() {
        let cfg = config(&[
            (DATABASE_URL, "postgres://localhost/warden"),
            (MAX_FAILED_ACCESS, "3"),
            (LOCKOUT_SECONDS, "60"),
            (PASSWORD_MIN_LENGTH, "10"),
        ]);
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/warden"));
        assert_eq!(cfg.lockout.max_failed_access_attempts, 3);
        assert_eq!(cfg.lockout.lockout_duration, chrono::Duration::seconds(60));
        assert_eq!(cfg.password_policy.required_length, 10);
        assert!(cfg.password_policy.require_digit);
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let cfg = config(&[(MAX_FAILED_ACCESS, "many"), (DATABASE_URL, "  ")]);
        assert_eq!(cfg.lockout, LockoutOptions::default());
        assert_eq!(cfg.database_url, None);
    }

    #[test]
    fn out_of_range_lockout_falls_back_to_default() {
        let default = LockoutOptions::default().lockout_duration;

        let huge = config(&[(LOCKOUT_SECONDS, "9223372036854775807")]);
        assert_eq!(huge.lockout.lockout_duration, default);

        let negative = config(&[(LOCKOUT_SECONDS, "-30")]);
        assert_eq!(negative.lockout.lockout_duration, default);

        let zero = config(&[(LOCKOUT_SECONDS, "0")]);
        assert_eq!(zero.lockout.lockout_duration, chrono::Duration::zero());
    }
}
