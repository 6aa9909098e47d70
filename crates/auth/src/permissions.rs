use serde::{Deserialize, Serialize};

use crate::claims::{Claim, ClaimType, flag_value};

/// One of the five boolean capabilities a user can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    Create,
    Update,
    Read,
    Delete,
    ManageUser,
}

impl Capability {
    /// All capabilities, in the order their claims are written.
    pub const ALL: [Capability; 5] = [
        Capability::Create,
        Capability::Update,
        Capability::Read,
        Capability::ManageUser,
        Capability::Delete,
    ];

    pub fn claim_type(self) -> ClaimType {
        match self {
            Capability::Create => ClaimType::CREATE,
            Capability::Update => ClaimType::UPDATE,
            Capability::Read => ClaimType::READ,
            Capability::Delete => ClaimType::DELETE,
            Capability::ManageUser => ClaimType::MANAGE_USER,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Create => "Create",
            Capability::Update => "Update",
            Capability::Read => "Read",
            Capability::Delete => "Delete",
            Capability::ManageUser => "ManageUser",
        }
    }
}

impl core::fmt::Display for Capability {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The five capability flags of a user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub create: bool,
    pub update: bool,
    pub read: bool,
    pub delete: bool,
    pub manage_user: bool,
}

impl Capabilities {
    /// Every capability granted.
    pub fn all() -> Self {
        Self {
            create: true,
            update: true,
            read: true,
            delete: true,
            manage_user: true,
        }
    }

    pub fn get(&self, capability: Capability) -> bool {
        match capability {
            Capability::Create => self.create,
            Capability::Update => self.update,
            Capability::Read => self.read,
            Capability::Delete => self.delete,
            Capability::ManageUser => self.manage_user,
        }
    }

    pub fn with(mut self, capability: Capability, granted: bool) -> Self {
        let slot = match capability {
            Capability::Create => &mut self.create,
            Capability::Update => &mut self.update,
            Capability::Read => &mut self.read,
            Capability::Delete => &mut self.delete,
            Capability::ManageUser => &mut self.manage_user,
        };
        *slot = granted;
        self
    }

    /// Derive flags from a claim set (first match per type, absent = false).
    pub fn from_claims(claims: &[Claim]) -> Self {
        Capability::ALL
            .into_iter()
            .fold(Self::default(), |caps, cap| caps.with(cap, flag_value(claims, cap)))
    }

    /// One claim per capability, in [`Capability::ALL`] order.
    pub fn to_claims(self) -> Vec<Claim> {
        Capability::ALL
            .into_iter()
            .map(|cap| Claim::capability(cap, self.get(cap)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_round_through_flags() {
        let caps = Capabilities::default()
            .with(Capability::Read, true)
            .with(Capability::Delete, true);
        let claims = caps.to_claims();
        assert_eq!(claims.len(), 5);
        assert_eq!(Capabilities::from_claims(&claims), caps);
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let json = serde_json::to_value(Capabilities::all()).unwrap();
        assert_eq!(json["manageUser"], serde_json::Value::Bool(true));
    }
}
