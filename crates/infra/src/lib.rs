//! Infrastructure layer: user store adapters, password handling, config.

pub mod config;
pub mod password;
pub mod store;

mod integration_tests;

pub use config::InfraConfig;
pub use password::PasswordPolicy;
pub use store::{InMemoryUserStore, LockoutOptions, PostgresUserStore, SignInState};
