//! `warden-auth` — account operations and claims-based permissions.
//!
//! This crate is intentionally decoupled from HTTP and storage: persistence,
//! password hashing and sign-in sessions live behind the [`UserStore`] port.

pub mod account;
pub mod authorize;
pub mod claims;
pub mod permissions;
pub mod policy;
pub mod requests;
pub mod response;
pub mod roles;
pub mod store;
pub mod user;

pub use account::AccountService;
pub use authorize::{AccessPolicy, AuthzError, Principal, authorize, require_capability};
pub use claims::{Claim, ClaimType};
pub use permissions::{Capabilities, Capability};
pub use policy::{Policy, base_claims, resolve_claims};
pub use requests::{ChangeUserClaimsRequest, CreateUserRequest, LoginUserRequest};
pub use response::{AccountError, ServiceResponse, UserLookup};
pub use roles::Role;
pub use store::{IdentityError, IdentityResult, UserStore, UserStoreError};
pub use user::{User, UserWithClaims, normalize_email};
