//! JWT token generation and verification.
//!
//! Access tokens and refresh tokens are both HS256 JWTs signed with separate
//! secrets. Access tokens carry the employee identity; refresh tokens carry
//! only the owner id and a random `jti` so that every issued token string is
//! unique. Refresh-token expiry is authoritative in the ledger row, not in
//! the JWT.

use std::path::PathBuf;

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::AuthError;
use crate::models::Employee;

/// Default access token lifetime: 1 hour.
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 60 * 60;

/// Refresh token lifetime: 7 days.
pub const REFRESH_TOKEN_TTL_DAYS: i64 = 7;

/// Claims embedded in access tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Employee row id.
    pub id: i64,
    /// Human-facing employee code.
    pub employee_id: String,
    pub email: String,
    pub is_active: bool,
    pub is_superadmin: bool,
    pub iat: i64,
    pub exp: i64,
}

/// Claims embedded in refresh tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub id: i64,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// Generate a signed access token for an employee.
pub fn generate_access_token(
    employee: &Employee,
    secret: &[u8],
    ttl: Duration,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let claims = AccessClaims {
        id: employee.id,
        employee_id: employee.employee_id.clone(),
        email: employee.email.clone(),
        is_active: employee.is_active,
        is_superadmin: employee.is_superadmin,
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| AuthError::TokenError(format!("jwt encode: {e}")))
}

/// Verify an access token's signature and expiry, returning its claims.
pub fn verify_access_token(token: &str, secret: &[u8]) -> Option<AccessClaims> {
    let key = DecodingKey::from_secret(secret);
    let mut validation = Validation::default();
    validation.validate_exp = true;
    decode::<AccessClaims>(token, &key, &validation)
        .ok()
        .map(|data| data.claims)
}

/// Generate a signed refresh token string for an employee.
pub fn generate_refresh_token(
    employee_id: i64,
    secret: &[u8],
    ttl: Duration,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let claims = RefreshClaims {
        id: employee_id,
        jti: uuid::Uuid::new_v4().to_string(),
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| AuthError::TokenError(format!("jwt encode: {e}")))
}

/// Check a refresh token's signature and return its claims.
///
/// Expiry is not checked here: the ledger row decides, so that an expired
/// token can still be found and revoked.
pub fn decode_refresh_token(token: &str, secret: &[u8]) -> Option<RefreshClaims> {
    let key = DecodingKey::from_secret(secret);
    let mut validation = Validation::default();
    validation.validate_exp = false;
    decode::<RefreshClaims>(token, &key, &validation)
        .ok()
        .map(|data| data.claims)
}

/// Resolve a signing secret: the first non-empty env var in `vars`, else a
/// generated secret persisted under the user data dir as `file_name`.
pub fn resolve_secret(vars: &[&str], file_name: &str) -> String {
    for var in vars {
        if let Ok(secret) = std::env::var(var)
            && !secret.is_empty()
        {
            return secret;
        }
    }
    let secret_path = secret_path(file_name);
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = secret_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(&secret_path, &secret);
    info!(path = %secret_path.display(), "generated new signing secret");
    secret
}

fn secret_path(file_name: &str) -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("qore")
        .join(file_name)
}
