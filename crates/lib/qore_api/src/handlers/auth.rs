//! Employee authentication handlers.

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::{Extension, Json};
use validator::Validate;

use crate::AppState;
use crate::error::AppResult;
use crate::extract::{ClientIp, ValidatedJson};
use crate::middleware::auth::Principal;
use crate::models::{
    ApiResponse, ChangePasswordRequest, EmployeeData, LoginRequest, LoginResponse, LogoutRequest,
    RefreshRequest, RevokedData, TokenPair,
};
use crate::services::auth;

/// `POST /api/employee-auth/login`: authenticate with email + password.
pub async fn login_handler(
    State(state): State<AppState>,
    ip: ClientIp,
    ValidatedJson(body): ValidatedJson<LoginRequest>,
) -> AppResult<Json<ApiResponse<LoginResponse>>> {
    body.validate()?;
    let resp = auth::login(
        state.store.as_ref(),
        &state.config,
        &body.email,
        &body.password,
        ip.as_deref(),
    )
    .await?;
    Ok(Json(ApiResponse::ok("Login successful", resp)))
}

/// `POST /api/employee-auth/refresh-token`: rotate a refresh token.
pub async fn refresh_handler(
    State(state): State<AppState>,
    ip: ClientIp,
    ValidatedJson(body): ValidatedJson<RefreshRequest>,
) -> AppResult<Json<ApiResponse<TokenPair>>> {
    body.validate()?;
    let pair = auth::refresh(
        state.store.as_ref(),
        &state.config,
        &body.refresh_token,
        ip.as_deref(),
    )
    .await?;
    Ok(Json(ApiResponse::ok("Token refreshed successfully", pair)))
}

/// `POST /api/employee-auth/logout`: revoke the given refresh token, if any.
///
/// Succeeds whether or not the token existed. An empty or unparseable body is
/// treated as "no token".
pub async fn logout_handler(
    State(state): State<AppState>,
    ip: ClientIp,
    body: Result<Json<LogoutRequest>, JsonRejection>,
) -> AppResult<Json<ApiResponse<()>>> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    auth::logout(
        state.store.as_ref(),
        body.refresh_token.as_deref(),
        ip.as_deref(),
    )
    .await?;
    Ok(Json(ApiResponse::message("Logout successful")))
}

/// `POST /api/employee-auth/logout-all`
pub async fn logout_all_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ip: ClientIp,
) -> AppResult<Json<ApiResponse<RevokedData>>> {
    let revoked = auth::logout_all(state.store.as_ref(), &principal, ip.as_deref()).await?;
    Ok(Json(ApiResponse::ok(
        "Logged out from all sessions",
        RevokedData { revoked },
    )))
}

/// `GET /api/employee-auth/status`: the caller's own record.
pub async fn status_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<ApiResponse<EmployeeData>>> {
    let employee = auth::status(state.store.as_ref(), &principal).await?;
    Ok(Json(ApiResponse::ok(
        "Employee authenticated",
        EmployeeData { employee },
    )))
}

/// `POST /api/employee-auth/change-password`
pub async fn change_password_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ip: ClientIp,
    ValidatedJson(body): ValidatedJson<ChangePasswordRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    body.validate()?;
    auth::change_password(
        state.store.as_ref(),
        &state.config,
        &principal,
        &body.current_password,
        &body.new_password,
        ip.as_deref(),
    )
    .await?;
    Ok(Json(ApiResponse::message(
        "Password changed successfully. Please log in again.",
    )))
}
