use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::{IdentityResult, UserStoreError};

/// Outcome of an account operation: a success flag plus free-text detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceResponse {
    pub flag: bool,
    pub message: Option<String>,
}

impl ServiceResponse {
    /// Success with no message.
    pub fn ok() -> Self {
        Self {
            flag: true,
            message: None,
        }
    }

    pub fn ok_with(message: impl Into<String>) -> Self {
        Self {
            flag: true,
            message: Some(message.into()),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            flag: false,
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.flag
    }
}

/// How the missing user was looked up. Login and claim updates report
/// differently-cased messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserLookup {
    ByEmail,
    ById,
}

impl core::fmt::Display for UserLookup {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::ByEmail => "User Not Found",
            Self::ById => "User not Found",
        })
    }
}

/// Why an account operation failed.
///
/// Every variant except [`AccountError::Backend`] is an expected outcome and
/// is reported to callers as a failed [`ServiceResponse`]. `Backend` carries a
/// store fault and propagates as an error.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("User already exists")]
    UserAlreadyExists,

    #[error("{0}")]
    UserNotFound(UserLookup),

    #[error("{0}")]
    InvalidPolicy(String),

    #[error("Incorrect Credentials Provided")]
    InvalidCredentials,

    #[error("Unknown error occurred while logging in")]
    SignInFailed,

    /// Failure descriptions reported by the store, newline-joined.
    #[error("{0}")]
    Store(String),

    #[error(transparent)]
    Backend(#[from] UserStoreError),
}

impl AccountError {
    pub fn no_policy() -> Self {
        Self::InvalidPolicy("No Policy specified".to_string())
    }

    pub fn from_identity(result: &IdentityResult) -> Self {
        Self::Store(result.describe())
    }

    /// Fold an operation outcome into the response handed to callers.
    pub fn respond(
        outcome: Result<ServiceResponse, AccountError>,
    ) -> Result<ServiceResponse, UserStoreError> {
        match outcome {
            Ok(response) => Ok(response),
            Err(AccountError::Backend(e)) => Err(e),
            Err(e) => Ok(ServiceResponse::failure(e.to_string())),
        }
    }
}
