//! Role and role-assignment handlers. Mutations are superadmin only.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use qore_core::models::{EmployeeRole, Role};
use qore_core::store::PageQuery;
use validator::Validate;

use crate::AppState;
use crate::error::AppResult;
use crate::extract::{ValidatedJson, ValidatedPath, ValidatedQuery};
use crate::middleware::auth::{Principal, require_superadmin};
use crate::models::{
    ApiResponse, AssignRoleRequest, CreateRoleRequest, ListQuery, Paginated, UpdateRoleRequest,
};
use crate::services::roles;

/// `GET /api/roles`
pub async fn list_roles_handler(
    State(state): State<AppState>,
    ValidatedQuery(query): ValidatedQuery<ListQuery>,
) -> AppResult<Json<ApiResponse<Paginated<Role>>>> {
    let query = PageQuery::new(query.page, query.limit, query.search);
    let page = roles::list_roles(state.store.as_ref(), &query).await?;
    Ok(Json(ApiResponse::ok("Roles retrieved successfully", page.into())))
}

/// `GET /api/roles/{id}`
pub async fn get_role_handler(
    State(state): State<AppState>,
    ValidatedPath(id): ValidatedPath<i64>,
) -> AppResult<Json<ApiResponse<Role>>> {
    let role = roles::get_role(state.store.as_ref(), id).await?;
    Ok(Json(ApiResponse::ok("Role retrieved successfully", role)))
}

/// `POST /api/roles`
pub async fn create_role_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ValidatedJson(body): ValidatedJson<CreateRoleRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Role>>)> {
    require_superadmin(&principal)?;
    body.validate()?;
    let role = roles::create_role(state.store.as_ref(), body, &principal).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Role created successfully", role)),
    ))
}

/// `PUT /api/roles/{id}`
pub async fn update_role_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ValidatedPath(id): ValidatedPath<i64>,
    ValidatedJson(body): ValidatedJson<UpdateRoleRequest>,
) -> AppResult<Json<ApiResponse<Role>>> {
    require_superadmin(&principal)?;
    body.validate()?;
    let role = roles::update_role(state.store.as_ref(), id, body, &principal).await?;
    Ok(Json(ApiResponse::ok("Role updated successfully", role)))
}

/// `DELETE /api/roles/{id}`: 403 for system roles.
pub async fn delete_role_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ValidatedPath(id): ValidatedPath<i64>,
) -> AppResult<Json<ApiResponse<()>>> {
    require_superadmin(&principal)?;
    roles::delete_role(state.store.as_ref(), id, &principal).await?;
    Ok(Json(ApiResponse::message("Role deleted successfully")))
}

/// `GET /api/employees/{id}/roles`
pub async fn list_employee_roles_handler(
    State(state): State<AppState>,
    ValidatedPath(employee_id): ValidatedPath<i64>,
) -> AppResult<Json<ApiResponse<Vec<EmployeeRole>>>> {
    let assignments = roles::list_employee_roles(state.store.as_ref(), employee_id).await?;
    Ok(Json(ApiResponse::ok(
        "Employee roles retrieved successfully",
        assignments,
    )))
}

/// `POST /api/employees/{id}/roles`
pub async fn assign_role_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ValidatedPath(employee_id): ValidatedPath<i64>,
    ValidatedJson(body): ValidatedJson<AssignRoleRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<EmployeeRole>>)> {
    require_superadmin(&principal)?;
    let assignment =
        roles::assign_role(state.store.as_ref(), employee_id, body, &principal).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Role assigned successfully", assignment)),
    ))
}

/// `PUT /api/employees/{id}/roles/{assignment_id}/primary`
pub async fn set_primary_role_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ValidatedPath((employee_id, assignment_id)): ValidatedPath<(i64, i64)>,
) -> AppResult<Json<ApiResponse<EmployeeRole>>> {
    require_superadmin(&principal)?;
    let assignment =
        roles::set_primary_role(state.store.as_ref(), employee_id, assignment_id).await?;
    Ok(Json(ApiResponse::ok("Primary role updated", assignment)))
}

/// `DELETE /api/employees/{id}/roles/{assignment_id}`
pub async fn remove_employee_role_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ValidatedPath((employee_id, assignment_id)): ValidatedPath<(i64, i64)>,
) -> AppResult<Json<ApiResponse<()>>> {
    require_superadmin(&principal)?;
    roles::remove_employee_role(state.store.as_ref(), employee_id, assignment_id).await?;
    Ok(Json(ApiResponse::message("Role removed from employee")))
}
