use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Role carried in a user's `role` claim.
///
/// Roles are opaque strings at this layer. The three policy roles have
/// constants; claim updates may store any caller-provided role name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const ADMIN: Role = Role(Cow::Borrowed("Admin"));
    pub const MANAGER: Role = Role(Cow::Borrowed("Manager"));
    pub const USER: Role = Role(Cow::Borrowed("User"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
