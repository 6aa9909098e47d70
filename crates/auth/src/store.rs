//! The user store port.
//!
//! Credential storage, password hashing, sign-in sessions and claim
//! persistence are all owned by the store. `AccountService` only sees this
//! trait; adapters live in `warden-infra`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use warden_core::UserId;

use crate::claims::Claim;
use crate::user::User;

/// Infrastructure fault raised by a store (connectivity, query, lock state).
///
/// These are not account outcomes: they propagate out of `AccountService`
/// unchanged instead of becoming a failed `ServiceResponse`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UserStoreError {
    #[error("user store connection failed: {0}")]
    Connection(String),

    #[error("user store query failed: {0}")]
    Query(String),

    #[error("user store state poisoned")]
    Poisoned,
}

/// A single failure reported by a mutating store call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityError {
    pub code: String,
    pub description: String,
}

impl IdentityError {
    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
        }
    }
}

/// Result of a mutating store call; succeeded iff no errors were reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityResult {
    errors: Vec<IdentityError>,
}

impl IdentityResult {
    pub fn success() -> Self {
        Self::default()
    }

    pub fn failed(errors: Vec<IdentityError>) -> Self {
        Self { errors }
    }

    pub fn failed_with(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self::failed(vec![IdentityError::new(code, description)])
    }

    pub fn succeeded(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[IdentityError] {
        &self.errors
    }

    /// Error descriptions joined by newlines.
    pub fn describe(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.description.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// User, credential and claim storage.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Case-insensitive lookup by email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserStoreError>;

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, UserStoreError>;

    async fn list_users(&self) -> Result<Vec<User>, UserStoreError>;

    /// Persist a new user with the given password. Password policy
    /// violations and duplicates are reported in the `IdentityResult`.
    async fn create_user(&self, user: &User, password: &str) -> Result<IdentityResult, UserStoreError>;

    /// Verify a password without side effects (no lockout counting, no session).
    async fn check_password(&self, user: &User, password: &str) -> Result<bool, UserStoreError>;

    /// Verify a password and establish a session.
    async fn sign_in(&self, user_name: &str, password: &str) -> Result<bool, UserStoreError>;

    async fn get_claims(&self, user: &User) -> Result<Vec<Claim>, UserStoreError>;

    async fn add_claim(&self, user: &User, claim: Claim) -> Result<IdentityResult, UserStoreError>;

    async fn add_claims(&self, user: &User, claims: Vec<Claim>) -> Result<IdentityResult, UserStoreError>;

    async fn remove_claim(&self, user: &User, claim: &Claim) -> Result<IdentityResult, UserStoreError>;
}

#[async_trait]
impl<S> UserStore for Arc<S>
where
    S: UserStore + ?Sized,
{
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserStoreError> {
        (**self).find_by_email(email).await
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, UserStoreError> {
        (**self).find_by_id(id).await
    }

    async fn list_users(&self) -> Result<Vec<User>, UserStoreError> {
        (**self).list_users().await
    }

    async fn create_user(&self, user: &User, password: &str) -> Result<IdentityResult, UserStoreError> {
        (**self).create_user(user, password).await
    }

    async fn check_password(&self, user: &User, password: &str) -> Result<bool, UserStoreError> {
        (**self).check_password(user, password).await
    }

    async fn sign_in(&self, user_name: &str, password: &str) -> Result<bool, UserStoreError> {
        (**self).sign_in(user_name, password).await
    }

    async fn get_claims(&self, user: &User) -> Result<Vec<Claim>, UserStoreError> {
        (**self).get_claims(user).await
    }

    async fn add_claim(&self, user: &User, claim: Claim) -> Result<IdentityResult, UserStoreError> {
        (**self).add_claim(user, claim).await
    }

    async fn add_claims(&self, user: &User, claims: Vec<Claim>) -> Result<IdentityResult, UserStoreError> {
        (**self).add_claims(user, claims).await
    }

    async fn remove_claim(&self, user: &User, claim: &Claim) -> Result<IdentityResult, UserStoreError> {
        (**self).remove_claim(user, claim).await
    }
}
