use serde::Serialize;
use thiserror::Error;

use warden_core::UserId;

use crate::claims::{Claim, ClaimType, first_value};
use crate::permissions::{Capabilities, Capability};
use crate::roles::Role;

/// An authenticated user resolved from their claim set.
///
/// Construction is decoupled from storage and transport: callers load the
/// claims however they like and hand them over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub user_id: UserId,
    pub role: Option<Role>,
    pub capabilities: Capabilities,
}

impl Principal {
    pub fn from_claims(user_id: UserId, claims: &[Claim]) -> Self {
        Self {
            user_id,
            role: first_value(claims, &ClaimType::ROLE).map(|r| Role::new(r.to_string())),
            capabilities: Capabilities::from_claims(claims),
        }
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.role.as_ref() == Some(role)
    }
}

/// Role-based access policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPolicy {
    /// Admins and managers.
    Administration,
    /// Plain users.
    UserOnly,
}

impl AccessPolicy {
    pub fn name(self) -> &'static str {
        match self {
            AccessPolicy::Administration => "AdministrationPolicy",
            AccessPolicy::UserOnly => "UserPolicy",
        }
    }

    pub fn allowed_roles(self) -> Vec<Role> {
        match self {
            AccessPolicy::Administration => vec![Role::ADMIN, Role::MANAGER],
            AccessPolicy::UserOnly => vec![Role::USER],
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: {policy} requires one of roles {required:?}")]
    MissingRole {
        policy: &'static str,
        required: Vec<String>,
    },

    #[error("forbidden: missing capability '{0}'")]
    MissingCapability(Capability),
}

/// Check a principal against a role-based policy. Pure, no IO.
pub fn authorize(principal: &Principal, policy: AccessPolicy) -> Result<(), AuthzError> {
    let allowed = policy.allowed_roles();
    if allowed.iter().any(|role| principal.has_role(role)) {
        return Ok(());
    }

    tracing::debug!(
        user_id = %principal.user_id,
        policy = policy.name(),
        role = ?principal.role,
        "authorization denied"
    );
    Err(AuthzError::MissingRole {
        policy: policy.name(),
        required: allowed.iter().map(|r| r.as_str().to_string()).collect(),
    })
}

/// Check that a principal holds a capability flag.
pub fn require_capability(principal: &Principal, capability: Capability) -> Result<(), AuthzError> {
    if principal.capabilities.get(capability) {
        Ok(())
    } else {
        Err(AuthzError::MissingCapability(capability))
    }
}
