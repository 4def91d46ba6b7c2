//! Authentication primitives.
//!
//! Password hashing and JWT signing shared by the API services and the
//! bootstrap CLI. The flows themselves (login, rotation, logout) live in
//! `qore_api::services::auth`.

pub mod jwt;
pub mod password;

use thiserror::Error;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    CredentialError,

    #[error("Token error: {0}")]
    TokenError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
