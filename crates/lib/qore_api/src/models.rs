//! Request and response bodies.
//!
//! Envelope and auth payload keys are camelCase (`refreshToken`); entity
//! rows keep their snake_case column names.

use qore_core::models::Employee;
use qore_core::store::Page;
use serde::{Deserialize, Serialize};

use validator::Validate;

use crate::validation::{not_blank, valid_slug};

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Success envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    /// Success with no payload.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }
}

/// Failure envelope.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: i64,
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> From<Page<T>> for Paginated<T> {
    fn from(page: Page<T>) -> Self {
        let pagination = Pagination {
            total: page.total,
            page: page.page,
            limit: page.limit,
            total_pages: page.total_pages(),
        };
        Self {
            items: page.items,
            pagination,
        }
    }
}

/// `?page=&limit=&search=` query string.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(default)]
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub employee: Employee,
    pub token: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefreshRequest {
    #[serde(default, rename = "refreshToken")]
    #[validate(custom(function = "not_blank", message = "Refresh token is required"))]
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub token: String,
    pub refresh_token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EmployeeData {
    pub employee: Employee,
}

#[derive(Debug, Serialize)]
pub struct RevokedData {
    pub revoked: u64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[serde(default, rename = "currentPassword")]
    #[validate(custom(function = "not_blank", message = "Current password is required"))]
    pub current_password: String,
    #[serde(default, rename = "newPassword")]
    #[validate(length(min = 6, message = "New password must be at least 6 characters"))]
    pub new_password: String,
}

// ---------------------------------------------------------------------------
// Employees
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateEmployeeRequest {
    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "Employee ID is required"))]
    pub employee_id: String,
    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "First name is required"))]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    pub phone: Option<String>,
    pub branch_id: Option<i64>,
    pub department_id: Option<i64>,
    pub designation_id: Option<i64>,
    pub reporting_to: Option<i64>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_superadmin: bool,
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRoleRequest {
    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "Role name is required"))]
    pub name: String,
    #[validate(custom(
        function = "valid_slug",
        message = "Slug may only contain a-z, 0-9 and '-'"
    ))]
    pub slug: Option<String>,
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateRoleRequest {
    #[validate(custom(function = "not_blank", message = "Role name cannot be empty"))]
    pub name: Option<String>,
    #[validate(custom(
        function = "valid_slug",
        message = "Slug may only contain a-z, 0-9 and '-'"
    ))]
    pub slug: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct AssignRoleRequest {
    pub role_id: i64,
    #[serde(default)]
    pub is_primary: bool,
}
