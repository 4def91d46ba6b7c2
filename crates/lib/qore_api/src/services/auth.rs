//! Authentication service: login, refresh-token rotation, logout.
//!
//! Refresh tokens move through two states, live and revoked, and never back.
//! A refresh request that finds its token live but past `expires_at` revokes
//! it before failing. A successful refresh issues a successor and revokes
//! the old row in one atomic store call, linking it via `replaced_by_token`,
//! so two concurrent refreshes with the same token cannot both succeed.

use chrono::{Duration, Utc};
use qore_core::auth::jwt::{
    REFRESH_TOKEN_TTL_DAYS, decode_refresh_token, generate_access_token, generate_refresh_token,
};
use qore_core::auth::password::{hash_password, verify_password};
use qore_core::models::{Employee, NewRefreshToken};
use qore_core::store::Store;
use tracing::{info, warn};

use crate::config::ApiConfig;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::Principal;
use crate::models::{LoginResponse, TokenPair};

const INVALID_CREDENTIALS: &str = "Invalid email or password";
const INACTIVE_ACCOUNT: &str = "Account is inactive. Please contact administrator.";
const INVALID_REFRESH_TOKEN: &str = "Invalid refresh token";
const EXPIRED_REFRESH_TOKEN: &str = "Refresh token expired";

fn invalid_refresh_token() -> AppError {
    AppError::Unauthorized(INVALID_REFRESH_TOKEN.into())
}

/// Sign a fresh refresh token for an employee, without persisting it.
fn new_refresh_token(
    config: &ApiConfig,
    employee_id: i64,
    ip: Option<&str>,
) -> AppResult<NewRefreshToken> {
    let ttl = Duration::days(REFRESH_TOKEN_TTL_DAYS);
    let token = generate_refresh_token(employee_id, config.jwt_refresh_secret.as_bytes(), ttl)?;
    Ok(NewRefreshToken {
        token,
        employee_id,
        expires_at: Utc::now() + ttl,
        created_by_ip: ip.map(str::to_string),
    })
}

/// A stored value that is not a bcrypt hash never matches.
fn password_matches(employee: &Employee, password: &str) -> bool {
    verify_password(password, &employee.password_hash).unwrap_or_else(|e| {
        warn!(employee = employee.id, error = %e, "stored password hash is unreadable");
        false
    })
}

fn access_token(config: &ApiConfig, employee: &Employee) -> AppResult<String> {
    Ok(generate_access_token(
        employee,
        config.jwt_secret.as_bytes(),
        config.access_token_ttl,
    )?)
}

/// Authenticate with email + password.
///
/// Unknown email and wrong password fail with the same message; an inactive
/// account says so.
pub async fn login(
    store: &dyn Store,
    config: &ApiConfig,
    email: &str,
    password: &str,
    ip: Option<&str>,
) -> AppResult<LoginResponse> {
    let Some(mut employee) = store.find_employee_by_email(email.trim()).await? else {
        warn!(ip, "login failed: unknown email");
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
    };

    if !employee.is_active {
        warn!(employee = employee.id, ip, "login refused: inactive account");
        return Err(AppError::Unauthorized(INACTIVE_ACCOUNT.into()));
    }

    if !password_matches(&employee, password) {
        warn!(employee = employee.id, ip, "login failed: wrong password");
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
    }

    let token = access_token(config, &employee)?;
    let refresh = store
        .insert_refresh_token(new_refresh_token(config, employee.id, ip)?)
        .await?;

    // Separate write; a failure here does not undo the issued tokens.
    let now = Utc::now();
    store.touch_last_login(employee.id, now).await?;
    employee.last_login = Some(now);

    info!(employee = employee.id, ip, "login succeeded");
    Ok(LoginResponse {
        employee,
        token,
        refresh_token: refresh.token,
    })
}

/// Exchange a live refresh token for a new access/refresh pair.
pub async fn refresh(
    store: &dyn Store,
    config: &ApiConfig,
    refresh_token: &str,
    ip: Option<&str>,
) -> AppResult<TokenPair> {
    let row = store
        .find_active_refresh_token(refresh_token)
        .await?
        .ok_or_else(|| {
            warn!(ip, "refresh rejected: unknown or revoked token");
            invalid_refresh_token()
        })?;

    if row.is_expired_at(Utc::now()) {
        store.revoke_refresh_token(refresh_token, ip).await?;
        warn!(employee = row.employee_id, ip, "refresh rejected: token expired");
        return Err(AppError::Unauthorized(EXPIRED_REFRESH_TOKEN.into()));
    }

    decode_refresh_token(refresh_token, config.jwt_refresh_secret.as_bytes())
        .filter(|claims| claims.id == row.employee_id)
        .ok_or_else(|| {
            warn!(employee = row.employee_id, ip, "refresh rejected: bad signature");
            invalid_refresh_token()
        })?;

    let employee = store
        .find_employee_by_id(row.employee_id)
        .await?
        .filter(|e| e.is_active)
        .ok_or_else(|| AppError::Unauthorized("Employee not found or inactive".into()))?;

    let token = access_token(config, &employee)?;
    let successor = store
        .rotate_refresh_token(
            refresh_token,
            new_refresh_token(config, employee.id, ip)?,
            ip,
        )
        .await?
        .ok_or_else(|| {
            warn!(employee = employee.id, ip, "refresh rejected: token rotated concurrently");
            invalid_refresh_token()
        })?;

    info!(employee = employee.id, ip, "refresh token rotated");
    Ok(TokenPair {
        token,
        refresh_token: successor.token,
    })
}

/// Revoke a refresh token if one is given and still live. Never fails on a
/// missing or already-revoked token.
pub async fn logout(store: &dyn Store, refresh_token: Option<&str>, ip: Option<&str>) -> AppResult<()> {
    if let Some(token) = refresh_token.filter(|t| !t.is_empty()) {
        let revoked = store.revoke_refresh_token(token, ip).await?;
        info!(revoked, ip, "logout");
    }
    Ok(())
}

/// Revoke every live refresh token of the caller.
pub async fn logout_all(store: &dyn Store, principal: &Principal, ip: Option<&str>) -> AppResult<u64> {
    let revoked = store.revoke_all_refresh_tokens(principal.id, ip).await?;
    info!(employee = principal.id, revoked, ip, "logout from all sessions");
    Ok(revoked)
}

/// The caller's own employee record.
pub async fn status(store: &dyn Store, principal: &Principal) -> AppResult<Employee> {
    store
        .find_employee_by_id(principal.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Employee not found".into()))
}

/// Change the caller's password and revoke all of their refresh tokens.
pub async fn change_password(
    store: &dyn Store,
    config: &ApiConfig,
    principal: &Principal,
    current_password: &str,
    new_password: &str,
    ip: Option<&str>,
) -> AppResult<()> {
    let employee = status(store, principal).await?;
    if !password_matches(&employee, current_password) {
        warn!(employee = employee.id, ip, "password change refused: wrong current password");
        return Err(AppError::Unauthorized("Current password is incorrect".into()));
    }
    let hash = hash_password(new_password, config.bcrypt_cost)?;
    store
        .update_password_hash(employee.id, &hash, Some(principal.id))
        .await?;
    let revoked = store.revoke_all_refresh_tokens(employee.id, ip).await?;
    info!(employee = employee.id, revoked, "password changed");
    Ok(())
}
