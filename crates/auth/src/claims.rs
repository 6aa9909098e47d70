//! Claims attached to user accounts.
//!
//! A claim is a `(type, value)` pair. Stores keep claims as an unordered,
//! non-deduplicated list, so every reader in this crate uses first-match
//! semantics: the first claim of a given type wins.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::permissions::Capability;

/// Claim type identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimType(Cow<'static, str>);

impl ClaimType {
    pub const EMAIL: ClaimType = ClaimType(Cow::Borrowed("email"));
    pub const ROLE: ClaimType = ClaimType(Cow::Borrowed("role"));
    pub const NAME: ClaimType = ClaimType(Cow::Borrowed("Name"));
    pub const CREATE: ClaimType = ClaimType(Cow::Borrowed("Create"));
    pub const UPDATE: ClaimType = ClaimType(Cow::Borrowed("Update"));
    pub const READ: ClaimType = ClaimType(Cow::Borrowed("Read"));
    pub const DELETE: ClaimType = ClaimType(Cow::Borrowed("Delete"));
    pub const MANAGE_USER: ClaimType = ClaimType(Cow::Borrowed("ManageUser"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ClaimType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A typed key/value fact attached to a user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Claim {
    pub claim_type: ClaimType,
    pub value: String,
}

impl Claim {
    pub fn new(claim_type: ClaimType, value: impl Into<String>) -> Self {
        Self {
            claim_type,
            value: value.into(),
        }
    }

    pub fn email(email: impl Into<String>) -> Self {
        Self::new(ClaimType::EMAIL, email)
    }

    pub fn role(role: &crate::Role) -> Self {
        Self::new(ClaimType::ROLE, role.as_str())
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self::new(ClaimType::NAME, name)
    }

    /// Capability flag claim; the value is always the literal `"true"` or `"false"`.
    pub fn capability(capability: Capability, granted: bool) -> Self {
        Self::new(capability.claim_type(), flag_literal(granted))
    }

    pub fn is_type(&self, claim_type: &ClaimType) -> bool {
        &self.claim_type == claim_type
    }
}

impl core::fmt::Display for Claim {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}={}", self.claim_type, self.value)
    }
}

/// Value of the first claim of `claim_type`, if any.
pub fn first_value<'a>(claims: &'a [Claim], claim_type: &ClaimType) -> Option<&'a str> {
    claims
        .iter()
        .find(|c| c.is_type(claim_type))
        .map(|c| c.value.as_str())
}

/// Read a boolean capability claim. Absent or unparseable values read as `false`.
pub fn flag_value(claims: &[Claim], capability: Capability) -> bool {
    match first_value(claims, &capability.claim_type()) {
        Some(raw) => parse_flag(raw).unwrap_or_else(|| {
            tracing::warn!(capability = %capability, value = raw, "unparseable capability claim; treating as false");
            false
        }),
        None => false,
    }
}

pub(crate) fn flag_literal(granted: bool) -> &'static str {
    if granted { "true" } else { "false" }
}

fn parse_flag(raw: &str) -> Option<bool> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("true") {
        Some(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}
