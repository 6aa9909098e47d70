//! Named policies and the claim sets they grant at registration.
//!
//! Every resolved claim set starts from the base claims (email, display name,
//! all five capabilities at `"false"`). A policy's grants then overwrite the
//! base value of the same claim type, so the result holds one claim per type.

use serde::{Deserialize, Serialize};

use crate::claims::Claim;
use crate::permissions::{Capabilities, Capability};
use crate::response::AccountError;
use crate::roles::Role;

/// Policy bundles granted at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Policy {
    Admin,
    Manager,
    User,
}

impl Policy {
    pub const ALL: [Policy; 3] = [Policy::Admin, Policy::Manager, Policy::User];

    pub fn as_str(self) -> &'static str {
        match self {
            Policy::Admin => "Admin",
            Policy::Manager => "Manager",
            Policy::User => "User",
        }
    }

    /// Case-insensitive lookup; surrounding whitespace is ignored.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(name))
    }

    pub fn role(self) -> Role {
        match self {
            Policy::Admin => Role::ADMIN,
            Policy::Manager => Role::MANAGER,
            Policy::User => Role::USER,
        }
    }

    pub fn capabilities(self) -> Capabilities {
        match self {
            Policy::Admin => Capabilities::all(),
            Policy::Manager => Capabilities::default()
                .with(Capability::Create, true)
                .with(Capability::Update, true)
                .with(Capability::Read, true),
            Policy::User => Capabilities::default(),
        }
    }

    /// Claims this policy adds on top of the base claims: the role plus every
    /// capability it switches on.
    pub fn grants(self) -> Vec<Claim> {
        let caps = self.capabilities();
        std::iter::once(Claim::role(&self.role()))
            .chain(
                Capability::ALL
                    .into_iter()
                    .filter(|cap| caps.get(*cap))
                    .map(|cap| Claim::capability(cap, true)),
            )
            .collect()
    }
}

impl core::fmt::Display for Policy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims every registered user receives regardless of policy.
pub fn base_claims(email: &str, name: &str) -> Vec<Claim> {
    let mut claims = vec![Claim::email(email), Claim::name(name)];
    claims.extend(Capabilities::default().to_claims());
    claims
}

/// Resolve a policy name into the full claim set for a new user.
///
/// An empty name fails with `InvalidPolicy`. A non-empty name that matches no
/// policy yields the base claims only (no role claim).
pub fn resolve_claims(policy_name: &str, email: &str, name: &str) -> Result<Vec<Claim>, AccountError> {
    if policy_name.trim().is_empty() {
        return Err(AccountError::no_policy());
    }

    let mut claims = base_claims(email, name);

    let Some(policy) = Policy::from_name(policy_name) else {
        tracing::warn!(policy = policy_name, "unrecognized policy; granting base claims only");
        return Ok(claims);
    };

    for grant in policy.grants() {
        match claims.iter_mut().find(|c| c.claim_type == grant.claim_type) {
            Some(existing) => existing.value = grant.value,
            None => claims.push(grant),
        }
    }

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::{ClaimType, first_value};
    use proptest::prelude::*;

    fn resolve(policy: &str) -> Vec<Claim> {
        resolve_claims(policy, "a@b.com", "Alice").unwrap()
    }

    fn assert_one_per_type(claims: &[Claim]) {
        for claim in claims {
            let count = claims.iter().filter(|c| c.claim_type == claim.claim_type).count();
            assert_eq!(count, 1, "duplicate claim type {}", claim.claim_type);
        }
    }

    #[test]
    fn admin_gets_every_capability() {
        let claims = resolve("admin");
        assert_eq!(first_value(&claims, &ClaimType::ROLE), Some("Admin"));
        assert_eq!(Capabilities::from_claims(&claims), Capabilities::all());
        assert_eq!(claims.len(), 8);
        assert_one_per_type(&claims);
    }

    #[test]
    fn manager_cannot_delete_or_manage_users() {
        let claims = resolve("Manager");
        assert_eq!(first_value(&claims, &ClaimType::ROLE), Some("Manager"));
        let caps = Capabilities::from_claims(&claims);
        assert!(caps.create && caps.update && caps.read);
        assert!(!caps.delete && !caps.manage_user);
        assert_one_per_type(&claims);
    }

    #[test]
    fn user_policy_grants_role_only() {
        let claims = resolve("USER");
        assert_eq!(first_value(&claims, &ClaimType::ROLE), Some("User"));
        assert_eq!(Capabilities::from_claims(&claims), Capabilities::default());
        assert_eq!(first_value(&claims, &ClaimType::EMAIL), Some("a@b.com"));
        assert_eq!(first_value(&claims, &ClaimType::NAME), Some("Alice"));
        assert_one_per_type(&claims);
    }

    #[test]
    fn empty_or_blank_policy_is_rejected() {
        for name in ["", "  ", "\t"] {
            let err = resolve_claims(name, "a@b.com", "Alice").unwrap_err();
            assert!(matches!(err, AccountError::InvalidPolicy(ref msg) if msg == "No Policy specified"));
        }
    }

    #[test]
    fn unknown_policy_yields_base_claims_without_role() {
        let claims = resolve("superuser");
        assert_eq!(claims, base_claims("a@b.com", "Alice"));
        assert_eq!(first_value(&claims, &ClaimType::ROLE), None);
    }

    #[test]
    fn manager_grants_do_not_include_false_flags() {
        let grants = Policy::Manager.grants();
        assert_eq!(grants.len(), 4);
        assert!(grants.iter().all(|c| c.claim_type == ClaimType::ROLE || c.value == "true"));
    }

    proptest! {
        #[test]
        fn policy_lookup_ignores_case(flips in proptest::collection::vec(any::<bool>(), 7)) {
            for policy in Policy::ALL {
                let mixed: String = policy
                    .as_str()
                    .chars()
                    .zip(flips.iter().cycle())
                    .map(|(c, upper)| if *upper { c.to_ascii_uppercase() } else { c.to_ascii_lowercase() })
                    .collect();
                prop_assert_eq!(Policy::from_name(&mixed), Some(policy));
            }
        }
    }
}
