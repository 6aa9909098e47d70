//! Inputs to account operations.
//!
//! `validate()` applies the input rules a transport layer is expected to
//! enforce before calling `AccountService`. The service itself does not call
//! it; password strength at registration is enforced by the store.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use warden_core::{DomainError, DomainResult, UserId};

use crate::claims::Claim;
use crate::permissions::Capabilities;
use crate::roles::Role;

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles"));

const PASSWORD_MIN_CHARS: usize = 8;
const PASSWORD_MAX_CHARS: usize = 100;
const PASSWORD_SPECIALS: &str = "#!@$%^&*-";

/// Registration input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub name: String,
    pub password: String,
    pub policy: String,
}

impl CreateUserRequest {
    pub fn validate(&self) -> DomainResult<()> {
        validate_email(&self.email)?;
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("Name is required"));
        }
        validate_password(&self.password)
    }
}

/// Login input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginUserRequest {
    pub email: String,
    pub password: String,
}

impl LoginUserRequest {
    pub fn validate(&self) -> DomainResult<()> {
        validate_email(&self.email)?;
        validate_password(&self.password)
    }
}

/// Wholesale replacement of a user's role, name and capability claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeUserClaimsRequest {
    pub user_id: UserId,
    pub role_name: String,
    pub name: String,
    #[serde(flatten)]
    pub capabilities: Capabilities,
}

impl ChangeUserClaimsRequest {
    /// The claim set that replaces the old one, in write order. The email
    /// claim keeps the account's current email.
    pub fn replacement_claims(&self, email: &str) -> Vec<Claim> {
        let mut claims = vec![
            Claim::email(email),
            Claim::role(&Role::new(self.role_name.clone())),
            Claim::name(self.name.as_str()),
        ];
        claims.extend(self.capabilities.to_claims());
        claims
    }
}

fn validate_email(email: &str) -> DomainResult<()> {
    if email.trim().is_empty() {
        return Err(DomainError::validation("Email is required"));
    }
    if !EMAIL_PATTERN.is_match(email) {
        return Err(DomainError::validation("Your Email is not valid"));
    }
    Ok(())
}

fn validate_password(password: &str) -> DomainResult<()> {
    if password.is_empty() {
        return Err(DomainError::validation("Password is required"));
    }

    let len = password.chars().count();
    if len < PASSWORD_MIN_CHARS {
        return Err(DomainError::validation(
            "Password must be at least 8 characters long",
        ));
    }
    if len > PASSWORD_MAX_CHARS {
        return Err(DomainError::validation(
            "Password must not exceed 100 characters",
        ));
    }

    let complex = password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| PASSWORD_SPECIALS.contains(c));
    if !complex {
        return Err(DomainError::validation(
            "Password must contain at least one uppercase letter, one lowercase letter, one number, and one special character",
        ));
    }

    Ok(())
}
