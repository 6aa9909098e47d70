//! User accounts and their claim-derived summaries.

use serde::{Deserialize, Serialize};

use warden_core::UserId;

use crate::claims::{Claim, ClaimType, first_value};
use crate::permissions::Capabilities;

/// A registered user account.
///
/// The password credential is owned by the store and never travels on this type.
///
/// # Invariants
/// - `user_name` equals `email` (the email is the login name).
/// - At most one user exists per email, compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub user_name: String,
    pub email: String,
    pub name: String,
}

impl User {
    /// A fresh account for registration (new id, trimmed inputs).
    pub fn register(email: &str, name: &str) -> Self {
        let email = email.trim().to_string();
        Self {
            id: UserId::new(),
            user_name: email.clone(),
            email,
            name: name.trim().to_string(),
        }
    }

    /// Key used by stores for case-insensitive email lookup.
    pub fn normalized_email(&self) -> String {
        normalize_email(&self.email)
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// A user as reported by `AccountService::users_with_claims`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserWithClaims {
    pub user_id: UserId,
    pub email: String,
    pub role_name: String,
    pub name: String,
    #[serde(flatten)]
    pub capabilities: Capabilities,
}

impl UserWithClaims {
    /// Summarize a claim set. Returns `None` for an empty claim set.
    pub fn from_claims(user_id: UserId, claims: &[Claim]) -> Option<Self> {
        if claims.is_empty() {
            return None;
        }

        let field = |claim_type: &ClaimType, fallback: &str| {
            first_value(claims, claim_type).unwrap_or(fallback).to_string()
        };

        Some(Self {
            user_id,
            email: field(&ClaimType::EMAIL, "No Email"),
            role_name: field(&ClaimType::ROLE, "No Role"),
            name: field(&ClaimType::NAME, "No Name"),
            capabilities: Capabilities::from_claims(claims),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::Capability;

    #[test]
    fn register_uses_email_as_user_name() {
        let user = User::register("  Bob@Example.com ", " Bob ");
        assert_eq!(user.user_name, "Bob@Example.com");
        assert_eq!(user.email, "Bob@Example.com");
        assert_eq!(user.name, "Bob");
        assert_eq!(user.normalized_email(), "bob@example.com");
    }

    #[test]
    fn empty_claim_set_has_no_summary() {
        assert!(UserWithClaims::from_claims(UserId::new(), &[]).is_none());
    }

    #[test]
    fn missing_claims_fall_back_to_placeholders() {
        let id = UserId::new();
        let claims = vec![Claim::capability(Capability::Read, true)];
        let row = UserWithClaims::from_claims(id, &claims).unwrap();

        assert_eq!(row.user_id, id);
        assert_eq!(row.email, "No Email");
        assert_eq!(row.role_name, "No Role");
        assert_eq!(row.name, "No Name");
        assert!(row.capabilities.read);
        assert!(!row.capabilities.create);
    }

    #[test]
    fn summary_flattens_capabilities() {
        let claims = vec![Claim::email("a@b.com"), Claim::role(&crate::Role::USER)];
        let row = UserWithClaims::from_claims(UserId::new(), &claims).unwrap();
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["roleName"], "User");
        assert_eq!(json["create"], false);
    }
}
