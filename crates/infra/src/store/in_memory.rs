//! In-memory user store for tests/dev.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use warden_auth::{Claim, IdentityResult, User, UserStore, UserStoreError, normalize_email};
use warden_core::{SessionId, UserId};

use super::{LockoutOptions, duplicate_email, is_locked_out, user_missing};
use crate::password::{PasswordPolicy, hash_password, verify_password};

/// Sign-in bookkeeping for one account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignInState {
    pub access_failed_count: u32,
    pub lockout_end: Option<DateTime<Utc>>,
    pub last_sign_in: Option<DateTime<Utc>>,
    pub session: Option<SessionId>,
}

#[derive(Debug, Clone)]
struct StoredAccount {
    user: User,
    password_hash: String,
    sign_in: SignInState,
    claims: Vec<Claim>,
}

#[derive(Debug, Default)]
struct Accounts {
    by_id: HashMap<UserId, StoredAccount>,
    by_email: HashMap<String, UserId>,
    /// Registration order, for stable listings.
    order: Vec<UserId>,
}

impl Accounts {
    fn by_email(&self, email: &str) -> Option<&StoredAccount> {
        self.by_email
            .get(&normalize_email(email))
            .and_then(|id| self.by_id.get(id))
    }
}

/// Process-local `UserStore`.
///
/// Guards are never held across an `.await`; password hashing and
/// verification run outside the lock.
#[derive(Debug)]
pub struct InMemoryUserStore {
    inner: RwLock<Accounts>,
    password_policy: PasswordPolicy,
    lockout: LockoutOptions,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::with_options(PasswordPolicy::default(), LockoutOptions::default())
    }

    pub fn with_options(password_policy: PasswordPolicy, lockout: LockoutOptions) -> Self {
        Self {
            inner: RwLock::new(Accounts::default()),
            password_policy,
            lockout,
        }
    }

    /// Sign-in bookkeeping for a user, if it exists.
    pub fn sign_in_state(&self, id: UserId) -> Result<Option<SignInState>, UserStoreError> {
        Ok(self.read()?.by_id.get(&id).map(|a| a.sign_in.clone()))
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Accounts>, UserStoreError> {
        self.inner.read().map_err(|_| UserStoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Accounts>, UserStoreError> {
        self.inner.write().map_err(|_| UserStoreError::Poisoned)
    }

    fn with_account<T>(
        &self,
        id: UserId,
        f: impl FnOnce(&mut StoredAccount) -> T,
    ) -> Result<Option<T>, UserStoreError> {
        Ok(self.write()?.by_id.get_mut(&id).map(f))
    }
}

impl Default for InMemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserStoreError> {
        Ok(self.read()?.by_email(email).map(|a| a.user.clone()))
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, UserStoreError> {
        Ok(self.read()?.by_id.get(&id).map(|a| a.user.clone()))
    }

    async fn list_users(&self) -> Result<Vec<User>, UserStoreError> {
        let accounts = self.read()?;
        Ok(accounts
            .order
            .iter()
            .filter_map(|id| accounts.by_id.get(id))
            .map(|a| a.user.clone())
            .collect())
    }

    async fn create_user(&self, user: &User, password: &str) -> Result<IdentityResult, UserStoreError> {
        let violations = self.password_policy.violations(password);
        if !violations.is_empty() {
            return Ok(IdentityResult::failed(violations));
        }
        if self.read()?.by_email(&user.email).is_some() {
            return Ok(IdentityResult::failed(vec![duplicate_email(user)]));
        }

        let password_hash = hash_password(password)?;

        let mut accounts = self.write()?;
        let key = user.normalized_email();
        // Re-checked under the write lock: another registration may have won.
        if accounts.by_email.contains_key(&key) {
            return Ok(IdentityResult::failed(vec![duplicate_email(user)]));
        }
        accounts.by_email.insert(key, user.id);
        accounts.order.push(user.id);
        accounts.by_id.insert(
            user.id,
            StoredAccount {
                user: user.clone(),
                password_hash,
                sign_in: SignInState::default(),
                claims: Vec::new(),
            },
        );
        Ok(IdentityResult::success())
    }

    async fn check_password(&self, user: &User, password: &str) -> Result<bool, UserStoreError> {
        let (password_hash, lockout_end) = match self.read()?.by_id.get(&user.id) {
            Some(a) => (a.password_hash.clone(), a.sign_in.lockout_end),
            None => return Ok(false),
        };
        if is_locked_out(lockout_end, Utc::now()) {
            tracing::debug!(user_id = %user.id, "password check refused: account locked out");
            return Ok(false);
        }
        Ok(verify_password(password, &password_hash))
    }

    async fn sign_in(&self, user_name: &str, password: &str) -> Result<bool, UserStoreError> {
        let (id, password_hash, lockout_end) = match self.read()?.by_email(user_name) {
            Some(a) => (a.user.id, a.password_hash.clone(), a.sign_in.lockout_end),
            None => return Ok(false),
        };

        let now = Utc::now();
        if is_locked_out(lockout_end, now) {
            tracing::info!(user_id = %id, "sign-in refused: account locked out");
            return Ok(false);
        }

        let verified = verify_password(password, &password_hash);
        let lockout = self.lockout;
        let updated = self.with_account(id, |account| {
            let state = &mut account.sign_in;
            if verified {
                *state = SignInState {
                    access_failed_count: 0,
                    lockout_end: None,
                    last_sign_in: Some(now),
                    session: Some(SessionId::new()),
                };
            } else {
                let (count, end) = lockout.record_failure(state.access_failed_count, now);
                state.access_failed_count = count;
                state.lockout_end = end;
                if end.is_some() {
                    tracing::warn!(user_id = %id, "account locked out after repeated failed sign-ins");
                }
            }
        })?;

        Ok(verified && updated.is_some())
    }

    async fn get_claims(&self, user: &User) -> Result<Vec<Claim>, UserStoreError> {
        Ok(self
            .read()?
            .by_id
            .get(&user.id)
            .map(|a| a.claims.clone())
            .unwrap_or_default())
    }

    async fn add_claim(&self, user: &User, claim: Claim) -> Result<IdentityResult, UserStoreError> {
        self.add_claims(user, vec![claim]).await
    }

    async fn add_claims(&self, user: &User, claims: Vec<Claim>) -> Result<IdentityResult, UserStoreError> {
        let added = self.with_account(user.id, |account| account.claims.extend(claims))?;
        Ok(match added {
            Some(()) => IdentityResult::success(),
            None => IdentityResult::failed(vec![user_missing()]),
        })
    }

    async fn remove_claim(&self, user: &User, claim: &Claim) -> Result<IdentityResult, UserStoreError> {
        let removed = self.with_account(user.id, |account| account.claims.retain(|c| c != claim))?;
        Ok(match removed {
            Some(()) => IdentityResult::success(),
            None => IdentityResult::failed(vec![user_missing()]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_auth::ClaimType;

    async fn store_with(email: &str, password: &str) -> (InMemoryUserStore, User) {
        let store = InMemoryUserStore::new();
        let user = User::register(email, "Test");
        assert!(store.create_user(&user, password).await.unwrap().succeeded());
        (store, user)
    }

    #[tokio::test]
    async fn email_lookup_ignores_case() {
        let (store, user) = store_with("Mixed@Case.com", "Str0ng!Pass").await;
        let found = store.find_by_email("mixed@case.COM").await.unwrap();
        assert_eq!(found, Some(user));
    }

    #[tokio::test]
    async fn duplicate_email_is_reported_as_identity_error() {
        let (store, _) = store_with("a@b.com", "Str0ng!Pass").await;
        let result = store
            .create_user(&User::register("A@b.com", "Other"), "Str0ng!Pass")
            .await
            .unwrap();
        assert_eq!(result.describe(), "Email 'A@b.com' is already taken.");
        assert_eq!(store.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn weak_password_is_not_stored() {
        let store = InMemoryUserStore::new();
        let user = User::register("a@b.com", "Test");
        let result = store.create_user(&user, "weak").await.unwrap();
        assert!(!result.succeeded());
        assert_eq!(store.find_by_id(user.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn check_password_has_no_side_effects() {
        let (store, user) = store_with("a@b.com", "Str0ng!Pass").await;

        for _ in 0..10 {
            assert!(!store.check_password(&user, "Wr0ng!Pass").await.unwrap());
        }

        assert_eq!(store.sign_in_state(user.id).unwrap(), Some(SignInState::default()));
    }

    #[tokio::test]
    async fn failed_sign_ins_lock_the_account() {
        let store = InMemoryUserStore::with_options(
            PasswordPolicy::default(),
            LockoutOptions {
                max_failed_access_attempts: 2,
                lockout_duration: chrono::Duration::minutes(1),
            },
        );
        let user = User::register("a@b.com", "Test");
        store.create_user(&user, "Str0ng!Pass").await.unwrap();

        assert!(!store.sign_in("a@b.com", "Wr0ng!Pass").await.unwrap());
        assert_eq!(store.sign_in_state(user.id).unwrap().unwrap().access_failed_count, 1);
        assert!(!store.sign_in("a@b.com", "Wr0ng!Pass").await.unwrap());

        // Locked: even the right password is refused, by both paths.
        assert!(!store.sign_in("a@b.com", "Str0ng!Pass").await.unwrap());
        assert!(!store.check_password(&user, "Str0ng!Pass").await.unwrap());
        assert!(store.sign_in_state(user.id).unwrap().unwrap().lockout_end.is_some());
    }

    #[tokio::test]
    async fn failed_sign_in_with_huge_lockout_still_returns() {
        let store = InMemoryUserStore::with_options(
            PasswordPolicy::default(),
            LockoutOptions {
                max_failed_access_attempts: 1,
                lockout_duration: chrono::Duration::seconds(9_000_000_000_000_000),
            },
        );
        let user = User::register("a@b.com", "Test");
        store.create_user(&user, "Str0ng!Pass").await.unwrap();

        assert!(!store.sign_in("a@b.com", "Wr0ng!Pass").await.unwrap());
        let state = store.sign_in_state(user.id).unwrap().unwrap();
        assert_eq!(state.lockout_end, Some(DateTime::<Utc>::MAX_UTC));
        assert!(!store.sign_in("a@b.com", "Str0ng!Pass").await.unwrap());
    }

    #[tokio::test]
    async fn successful_sign_in_opens_a_session() {
        let (store, user) = store_with("a@b.com", "Str0ng!Pass").await;

        assert!(store.sign_in("A@B.com", "Str0ng!Pass").await.unwrap());

        let state = store.sign_in_state(user.id).unwrap().unwrap();
        assert!(state.session.is_some());
        assert!(state.last_sign_in.is_some());
        assert_eq!(state.access_failed_count, 0);
    }

    #[tokio::test]
    async fn remove_claim_drops_every_equal_copy() {
        let (store, user) = store_with("a@b.com", "Str0ng!Pass").await;
        let read = Claim::new(ClaimType::READ, "true");
        let name = Claim::name("Test");
        store
            .add_claims(&user, vec![read.clone(), name.clone(), read.clone()])
            .await
            .unwrap();

        store.remove_claim(&user, &read).await.unwrap();

        assert_eq!(store.get_claims(&user).await.unwrap(), vec![name]);
    }

    #[tokio::test]
    async fn claims_for_unknown_user_are_rejected() {
        let store = InMemoryUserStore::new();
        let ghost = User::register("ghost@b.com", "Ghost");
        let result = store.add_claim(&ghost, Claim::name("Ghost")).await.unwrap();
        assert_eq!(result.describe(), "User not found.");
    }
}
