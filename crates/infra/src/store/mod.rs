//! `UserStore` adapters.

pub mod in_memory;
pub mod postgres;

pub use in_memory::{InMemoryUserStore, SignInState};
pub use postgres::PostgresUserStore;

use chrono::{DateTime, Duration, Utc};
use warden_auth::{IdentityError, User};

/// Failed sign-in limits shared by every adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutOptions {
    /// Consecutive failed sign-ins that trigger a lockout.
    pub max_failed_access_attempts: u32,
    pub lockout_duration: Duration,
}

impl Default for LockoutOptions {
    fn default() -> Self {
        Self {
            max_failed_access_attempts: 5,
            lockout_duration: Duration::minutes(5),
        }
    }
}

impl LockoutOptions {
    /// Counter and lockout end after one more failed sign-in. The lockout end
    /// saturates at the latest representable instant.
    pub(crate) fn record_failure(
        &self,
        failed_count: u32,
        now: DateTime<Utc>,
    ) -> (u32, Option<DateTime<Utc>>) {
        let failed_count = failed_count.saturating_add(1);
        if failed_count >= self.max_failed_access_attempts {
            let end = now
                .checked_add_signed(self.lockout_duration)
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            (0, Some(end))
        } else {
            (failed_count, None)
        }
    }
}

pub(crate) fn is_locked_out(lockout_end: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    lockout_end.is_some_and(|end| end > now)
}

pub(crate) fn duplicate_email(user: &User) -> IdentityError {
    IdentityError::new("DuplicateEmail", format!("Email '{}' is already taken.", user.email))
}

pub(crate) fn user_missing() -> IdentityError {
    IdentityError::new("UserNotFound", "User not found.")
}
