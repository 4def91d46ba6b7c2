//! Authentication middleware: bearer token extraction and verification.
//!
//! How a request is authenticated is decided once at startup by
//! [`verifier_for`]. Production builds can only ever get [`JwtVerifier`]; the
//! trusting [`DevVerifier`] exists only when the `dev-auth` feature is
//! compiled in, and that feature refuses to build in release mode.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use qore_core::auth::jwt::{AccessClaims, verify_access_token};
use serde::Serialize;

use crate::AppState;
use crate::config::ApiConfig;
use crate::error::{AppError, AppResult};

#[cfg(all(feature = "dev-auth", not(debug_assertions)))]
compile_error!("the `dev-auth` feature must not be enabled in release builds");

/// The authenticated caller, stored in request extensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: i64,
    pub employee_id: String,
    pub email: String,
    pub is_active: bool,
    pub is_superadmin: bool,
}

impl From<AccessClaims> for Principal {
    fn from(claims: AccessClaims) -> Self {
        Self {
            id: claims.id,
            employee_id: claims.employee_id,
            email: claims.email,
            is_active: claims.is_active,
            is_superadmin: claims.is_superadmin,
        }
    }
}

/// Turns request headers into a principal or a 401.
pub trait AuthVerifier: Send + Sync {
    fn verify(&self, headers: &HeaderMap) -> AppResult<Principal>;
}

/// Verifies `Authorization: Bearer <jwt>` signature and expiry.
pub struct JwtVerifier {
    secret: Vec<u8>,
}

impl JwtVerifier {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            secret: secret.to_vec(),
        }
    }
}

impl AuthVerifier for JwtVerifier {
    fn verify(&self, headers: &HeaderMap) -> AppResult<Principal> {
        let header = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing authorization header".into()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthorized("Invalid authorization scheme".into()))?;

        verify_access_token(token.trim(), &self.secret)
            .map(Principal::from)
            .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".into()))
    }
}

/// Trusts every request as a fixed superadmin.
#[cfg(feature = "dev-auth")]
pub struct DevVerifier;

#[cfg(feature = "dev-auth")]
impl DevVerifier {
    pub fn principal() -> Principal {
        Principal {
            id: 1,
            employee_id: "EMP001".into(),
            email: "admin@qore.local".into(),
            is_active: true,
            is_superadmin: true,
        }
    }
}

#[cfg(feature = "dev-auth")]
impl AuthVerifier for DevVerifier {
    fn verify(&self, _headers: &HeaderMap) -> AppResult<Principal> {
        Ok(Self::principal())
    }
}

/// Pick the verifier compiled into this build.
#[cfg(not(feature = "dev-auth"))]
pub fn verifier_for(config: &ApiConfig) -> Arc<dyn AuthVerifier> {
    Arc::new(JwtVerifier::new(config.jwt_secret.as_bytes()))
}

/// Pick the verifier compiled into this build.
#[cfg(feature = "dev-auth")]
pub fn verifier_for(_config: &ApiConfig) -> Arc<dyn AuthVerifier> {
    tracing::warn!("dev-auth build: every request is treated as the dev superadmin");
    Arc::new(DevVerifier)
}

/// Axum middleware: verifies the request and injects the [`Principal`] into
/// request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let principal = state.verifier.verify(request.headers())?;
    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

/// Reject callers that are not superadmins.
pub fn require_superadmin(principal: &Principal) -> AppResult<()> {
    if principal.is_superadmin {
        Ok(())
    } else {
        Err(AppError::Forbidden("Superadmin access required".into()))
    }
}
