//! Account operations: registration, login, user listing, claim replacement
//! and administrator bootstrap.
//!
//! Operations return `Ok(ServiceResponse)` for every expected outcome,
//! including failures such as a duplicate email. `Err` is reserved for
//! faults raised by the store itself.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, error, info, instrument, warn};

use warden_core::UserId;

use crate::policy::{Policy, resolve_claims};
use crate::requests::{ChangeUserClaimsRequest, CreateUserRequest, LoginUserRequest};
use crate::response::{AccountError, ServiceResponse, UserLookup};
use crate::store::{UserStore, UserStoreError};
use crate::user::{User, UserWithClaims};

/// Bootstrap administrator credentials used by [`AccountService::set_up`].
pub const ADMIN_EMAIL: &str = "admin@admin.com";
pub const ADMIN_NAME: &str = "Administrator";
pub const ADMIN_PASSWORD: &str = "Admin@123";

/// Account operations over a [`UserStore`].
pub struct AccountService<S> {
    store: S,
    /// Serializes claim replacement per user within this service.
    claim_locks: Mutex<HashMap<UserId, Arc<tokio::sync::Mutex<()>>>>,
}

impl<S> AccountService<S>
where
    S: UserStore,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            claim_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Register a user and attach the claims of the requested policy.
    ///
    /// Claims are attached only after the store accepts the user. If claim
    /// resolution or attachment then fails the user row is kept and the
    /// registration is still reported as failed.
    #[instrument(skip(self, request), fields(email = %request.email, policy = %request.policy))]
    pub async fn create_user(&self, request: &CreateUserRequest) -> Result<ServiceResponse, UserStoreError> {
        AccountError::respond(self.try_create_user(request).await)
    }

    async fn try_create_user(&self, request: &CreateUserRequest) -> Result<ServiceResponse, AccountError> {
        if self.store.find_by_email(&request.email).await?.is_some() {
            return Err(AccountError::UserAlreadyExists);
        }

        let user = User::register(&request.email, &request.name);
        let created = self.store.create_user(&user, &request.password).await?;
        if !created.succeeded() {
            debug!(errors = created.errors().len(), "store rejected new user");
            return Err(AccountError::from_identity(&created));
        }
        info!(user_id = %user.id, "user created");

        let claims = resolve_claims(&request.policy, &user.email, &user.name).inspect_err(|e| {
            warn!(user_id = %user.id, reason = %e, "user created without claims");
        })?;

        let attached = self.store.add_claims(&user, claims).await?;
        if !attached.succeeded() {
            warn!(user_id = %user.id, "user created but claims were rejected");
            return Err(AccountError::from_identity(&attached));
        }

        Ok(ServiceResponse::ok_with("User Created"))
    }

    /// Authenticate with email and password.
    ///
    /// The password is checked with the store's non-mutating check first, so
    /// a wrong password never reaches the session-establishing sign-in.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn login(&self, request: &LoginUserRequest) -> Result<ServiceResponse, UserStoreError> {
        AccountError::respond(self.try_login(request).await)
    }

    async fn try_login(&self, request: &LoginUserRequest) -> Result<ServiceResponse, AccountError> {
        let Some(user) = self.store.find_by_email(&request.email).await? else {
            return Err(AccountError::UserNotFound(UserLookup::ByEmail));
        };

        if !self.store.check_password(&user, &request.password).await? {
            debug!(user_id = %user.id, "password check failed");
            return Err(AccountError::InvalidCredentials);
        }

        if !self.store.sign_in(&user.user_name, &request.password).await? {
            error!(user_id = %user.id, "sign-in failed after a successful password check");
            return Err(AccountError::SignInFailed);
        }

        info!(user_id = %user.id, "user signed in");
        Ok(ServiceResponse::ok())
    }

    /// Every user that has at least one claim, summarized by first-match claim reads.
    #[instrument(skip(self))]
    pub async fn users_with_claims(&self) -> Result<Vec<UserWithClaims>, UserStoreError> {
        let users = self.store.list_users().await?;
        let mut rows = Vec::with_capacity(users.len());

        for user in users {
            let claims = self.store.get_claims(&user).await?;
            match UserWithClaims::from_claims(user.id, &claims) {
                Some(row) => rows.push(row),
                None => debug!(user_id = %user.id, "skipping user without claims"),
            }
        }

        Ok(rows)
    }

    /// Replace a user's claims wholesale.
    ///
    /// Old claims are removed one by one, then the new set is added one by
    /// one. This is not atomic: the first failing store call aborts and the
    /// user keeps whatever claims were written before it.
    #[instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn update_user_claims(
        &self,
        request: &ChangeUserClaimsRequest,
    ) -> Result<ServiceResponse, UserStoreError> {
        AccountError::respond(self.try_update_user_claims(request).await)
    }

    async fn try_update_user_claims(
        &self,
        request: &ChangeUserClaimsRequest,
    ) -> Result<ServiceResponse, AccountError> {
        let Some(user) = self.store.find_by_id(request.user_id).await? else {
            return Err(AccountError::UserNotFound(UserLookup::ById));
        };

        let lock = self.claim_lock(user.id);
        let outcome = {
            let _guard = lock.lock().await;
            self.replace_claims(&user, request).await
        };
        self.release_claim_lock(user.id, lock);
        outcome
    }

    async fn replace_claims(
        &self,
        user: &User,
        request: &ChangeUserClaimsRequest,
    ) -> Result<ServiceResponse, AccountError> {
        for claim in self.store.get_claims(user).await? {
            let removed = self.store.remove_claim(user, &claim).await?;
            if !removed.succeeded() {
                warn!(user_id = %user.id, claim = %claim, "claim removal failed; claim set is partial");
                return Err(AccountError::from_identity(&removed));
            }
        }

        let replacement = request.replacement_claims(&user.email);
        let total = replacement.len();
        for (written, claim) in replacement.into_iter().enumerate() {
            let added = self.store.add_claim(user, claim).await?;
            if !added.succeeded() {
                warn!(user_id = %user.id, written, total, "claim add failed; claim set is partial");
                return Err(AccountError::from_identity(&added));
            }
        }

        info!(user_id = %user.id, "user claims replaced");
        Ok(ServiceResponse::ok_with("User Updated"))
    }

    /// Ensure the bootstrap administrator exists. Safe to call repeatedly:
    /// later calls stop at the duplicate-email check.
    #[instrument(skip(self))]
    pub async fn set_up(&self) -> Result<ServiceResponse, UserStoreError> {
        let request = CreateUserRequest {
            email: ADMIN_EMAIL.to_string(),
            name: ADMIN_NAME.to_string(),
            password: ADMIN_PASSWORD.to_string(),
            policy: Policy::Admin.as_str().to_string(),
        };

        let response = self.create_user(&request).await?;
        if response.is_success() {
            info!("bootstrap administrator created");
        } else {
            debug!(message = ?response.message, "bootstrap administrator not created");
        }
        Ok(response)
    }

    fn claim_lock(&self, user_id: UserId) -> Arc<tokio::sync::Mutex<()>> {
        // The map holds no invariant a panic could break, so a poisoned lock is reused.
        let mut locks = self.claim_locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(user_id).or_default().clone()
    }

    /// Drop the map entry once no other update holds or awaits it.
    fn release_claim_lock(&self, user_id: UserId, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.claim_locks.lock().unwrap_or_else(PoisonError::into_inner);
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&user_id);
        }
    }
}
