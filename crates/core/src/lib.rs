//! `warden-core` — identity primitives shared by every warden crate.
//!
//! This crate contains **pure domain** primitives (no storage, no async).

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{SessionId, UserId};
