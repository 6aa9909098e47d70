//! Bootstrap the administrator account and report the resulting user table.

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use warden_auth::{AccountService, UserStore};
use warden_infra::{InMemoryUserStore, InfraConfig, PostgresUserStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    warden_observability::init();

    let config = InfraConfig::from_env();

    match config.database_url.as_deref() {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(url)
                .await
                .context("failed to connect to DATABASE_URL")?;
            let store = PostgresUserStore::new(pool, config.password_policy, config.lockout);
            store.ensure_schema().await.context("failed to prepare account tables")?;
            run(AccountService::new(store)).await
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory user store");
            let store = InMemoryUserStore::with_options(config.password_policy, config.lockout);
            run(AccountService::new(store)).await
        }
    }
}

async fn run<S: UserStore>(service: AccountService<S>) -> anyhow::Result<()> {
    let response = service.set_up().await.context("bootstrap failed")?;
    tracing::info!(created = response.flag, message = ?response.message, "bootstrap finished");

    for row in service.users_with_claims().await.context("listing users failed")? {
        tracing::info!(
            user_id = %row.user_id,
            email = %row.email,
            role = %row.role_name,
            create = row.capabilities.create,
            update = row.capabilities.update,
            read = row.capabilities.read,
            delete = row.capabilities.delete,
            manage_user = row.capabilities.manage_user,
            "account"
        );
    }

    Ok(())
}
