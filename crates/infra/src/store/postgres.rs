//! Postgres-backed user store.
//!
//! ## Error Mapping
//!
//! | SQLx error | Postgres code | Result |
//! |---|---|---|
//! | Database (unique violation) on account insert | `23505` | `IdentityResult` with `DuplicateEmail` |
//! | Io / PoolTimedOut / PoolClosed | N/A | `UserStoreError::Connection` |
//! | Anything else | any | `UserStoreError::Query` |
//!
//! ## Schema
//!
//! `ensure_schema()` creates the two tables if they are missing. It is a
//! bootstrap convenience, not a migration system.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::{Span, instrument};

use warden_auth::{Claim, ClaimType, IdentityResult, User, UserStore, UserStoreError, normalize_email};
use warden_core::UserId;

use super::{LockoutOptions, duplicate_email, is_locked_out, user_missing};
use crate::password::{PasswordPolicy, hash_password, verify_password};

const SCHEMA: [&str; 3] = [
    r#"
    CREATE TABLE IF NOT EXISTS accounts (
        id                  UUID PRIMARY KEY,
        user_name           TEXT NOT NULL,
        normalized_email    TEXT NOT NULL UNIQUE,
        email               TEXT NOT NULL,
        name                TEXT NOT NULL,
        password_hash       TEXT NOT NULL,
        access_failed_count INTEGER NOT NULL DEFAULT 0,
        lockout_end         TIMESTAMPTZ NULL,
        last_sign_in        TIMESTAMPTZ NULL,
        created_at          TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS account_claims (
        id          BIGSERIAL PRIMARY KEY,
        user_id     UUID NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
        claim_type  TEXT NOT NULL,
        claim_value TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS account_claims_user_id_idx ON account_claims (user_id)",
];

const UNIQUE_VIOLATION: &str = "23505";

/// Postgres-backed `UserStore`.
///
/// Uses the SQLx connection pool, which is `Send + Sync`. Claim rows keep
/// insertion order through their serial id, so first-match reads are stable.
#[derive(Debug, Clone)]
pub struct PostgresUserStore {
    pool: Arc<PgPool>,
    password_policy: PasswordPolicy,
    lockout: LockoutOptions,
}

impl PostgresUserStore {
    pub fn new(pool: PgPool, password_policy: PasswordPolicy, lockout: LockoutOptions) -> Self {
        Self {
            pool: Arc::new(pool),
            password_policy,
            lockout,
        }
    }

    /// Create the account tables if they do not exist.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), UserStoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }

    async fn credentials_by_email(
        &self,
        email: &str,
    ) -> Result<Option<(UserId, String, Option<DateTime<Utc>>, i32)>, UserStoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, password_hash, lockout_end, access_failed_count
            FROM accounts
            WHERE normalized_email = $1
            "#,
        )
        .bind(normalize_email(email))
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("credentials_by_email", e))?;

        row.map(|row| -> Result<_, sqlx::Error> {
            Ok((
                UserId::from_uuid(row.try_get("id")?),
                row.try_get("password_hash")?,
                row.try_get("lockout_end")?,
                row.try_get("access_failed_count")?,
            ))
        })
        .transpose()
        .map_err(|e| map_sqlx_error("credentials_by_email", e))
    }

    async fn user_exists(&self, id: UserId) -> Result<bool, UserStoreError> {
        let row = sqlx::query("SELECT 1 FROM accounts WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("user_exists", e))?;
        Ok(row.is_some())
    }
}

#[async_trait]
impl UserStore for PostgresUserStore {
    #[instrument(skip(self), err)]
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserStoreError> {
        let row = sqlx::query(
            "SELECT id, user_name, email, name FROM accounts WHERE normalized_email = $1",
        )
        .bind(normalize_email(email))
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_by_email", e))?;

        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, UserStoreError> {
        let row = sqlx::query("SELECT id, user_name, email, name FROM accounts WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_by_id", e))?;

        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip(self), fields(user_count = tracing::field::Empty), err)]
    async fn list_users(&self) -> Result<Vec<User>, UserStoreError> {
        let rows = sqlx::query("SELECT id, user_name, email, name FROM accounts ORDER BY created_at, id")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_users", e))?;

        Span::current().record("user_count", rows.len());
        rows.iter().map(user_from_row).collect()
    }

    #[instrument(skip(self, user, password), fields(user_id = %user.id), err)]
    async fn create_user(&self, user: &User, password: &str) -> Result<IdentityResult, UserStoreError> {
        let violations = self.password_policy.violations(password);
        if !violations.is_empty() {
            return Ok(IdentityResult::failed(violations));
        }

        let password_hash = hash_password(password)?;
        let inserted = sqlx::query(
            r#"
            INSERT INTO accounts (id, user_name, normalized_email, email, name, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.user_name)
        .bind(user.normalized_email())
        .bind(&user.email)
        .bind(&user.name)
        .bind(&password_hash)
        .execute(&*self.pool)
        .await;

        match inserted {
            Ok(_) => Ok(IdentityResult::success()),
            Err(sqlx::Error::Database(db)) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                Ok(IdentityResult::failed(vec![duplicate_email(user)]))
            }
            Err(e) => Err(map_sqlx_error("create_user", e)),
        }
    }

    #[instrument(skip(self, user, password), fields(user_id = %user.id), err)]
    async fn check_password(&self, user: &User, password: &str) -> Result<bool, UserStoreError> {
        let Some((_, password_hash, lockout_end, _)) = self.credentials_by_email(&user.email).await? else {
            return Ok(false);
        };
        if is_locked_out(lockout_end, Utc::now()) {
            return Ok(false);
        }
        Ok(verify_password(password, &password_hash))
    }

    #[instrument(skip(self, password), err)]
    async fn sign_in(&self, user_name: &str, password: &str) -> Result<bool, UserStoreError> {
        let Some((id, password_hash, lockout_end, failed)) = self.credentials_by_email(user_name).await? else {
            return Ok(false);
        };

        let now = Utc::now();
        if is_locked_out(lockout_end, now) {
            tracing::info!(user_id = %id, "sign-in refused: account locked out");
            return Ok(false);
        }

        if verify_password(password, &password_hash) {
            sqlx::query(
                r#"
                UPDATE accounts
                SET access_failed_count = 0, lockout_end = NULL, last_sign_in = $2
                WHERE id = $1
                "#,
            )
            .bind(id.as_uuid())
            .bind(now)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("sign_in", e))?;
            return Ok(true);
        }

        let (count, end) = self
            .lockout
            .record_failure(u32::try_from(failed).unwrap_or(0), now);
        sqlx::query("UPDATE accounts SET access_failed_count = $2, lockout_end = $3 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(i32::try_from(count).unwrap_or(i32::MAX))
            .bind(end)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("sign_in", e))?;
        if end.is_some() {
            tracing::warn!(user_id = %id, "account locked out after repeated failed sign-ins");
        }
        Ok(false)
    }

    #[instrument(skip(self, user), fields(user_id = %user.id), err)]
    async fn get_claims(&self, user: &User) -> Result<Vec<Claim>, UserStoreError> {
        let rows = sqlx::query(
            "SELECT claim_type, claim_value FROM account_claims WHERE user_id = $1 ORDER BY id",
        )
        .bind(user.id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_claims", e))?;

        rows.iter()
            .map(|row| {
                let claim_type: String = row.try_get("claim_type")?;
                let value: String = row.try_get("claim_value")?;
                Ok(Claim::new(ClaimType::new(claim_type), value))
            })
            .collect::<Result<_, sqlx::Error>>()
            .map_err(|e| map_sqlx_error("get_claims", e))
    }

    async fn add_claim(&self, user: &User, claim: Claim) -> Result<IdentityResult, UserStoreError> {
        self.add_claims(user, vec![claim]).await
    }

    #[instrument(skip(self, user, claims), fields(user_id = %user.id, claim_count = claims.len()), err)]
    async fn add_claims(&self, user: &User, claims: Vec<Claim>) -> Result<IdentityResult, UserStoreError> {
        if !self.user_exists(user.id).await? {
            return Ok(IdentityResult::failed(vec![user_missing()]));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("add_claims", e))?;
        for claim in &claims {
            sqlx::query(
                "INSERT INTO account_claims (user_id, claim_type, claim_value) VALUES ($1, $2, $3)",
            )
            .bind(user.id.as_uuid())
            .bind(claim.claim_type.as_str())
            .bind(&claim.value)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("add_claims", e))?;
        }
        tx.commit().await.map_err(|e| map_sqlx_error("add_claims", e))?;

        Ok(IdentityResult::success())
    }

    #[instrument(skip(self, user), fields(user_id = %user.id, claim = %claim), err)]
    async fn remove_claim(&self, user: &User, claim: &Claim) -> Result<IdentityResult, UserStoreError> {
        if !self.user_exists(user.id).await? {
            return Ok(IdentityResult::failed(vec![user_missing()]));
        }

        sqlx::query(
            "DELETE FROM account_claims WHERE user_id = $1 AND claim_type = $2 AND claim_value = $3",
        )
        .bind(user.id.as_uuid())
        .bind(claim.claim_type.as_str())
        .bind(&claim.value)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("remove_claim", e))?;

        Ok(IdentityResult::success())
    }
}

fn user_from_row(row: &sqlx::postgres::PgRow) -> Result<User, UserStoreError> {
    let map = |e| map_sqlx_error("user_from_row", e);
    Ok(User {
        id: UserId::from_uuid(row.try_get("id").map_err(map)?),
        user_name: row.try_get("user_name").map_err(map)?,
        email: row.try_get("email").map_err(map)?,
        name: row.try_get("name").map_err(map)?,
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> UserStoreError {
    match err {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            UserStoreError::Connection(format!("{operation}: {err}"))
        }
        other => UserStoreError::Query(format!("{operation}: {other}")),
    }
}
