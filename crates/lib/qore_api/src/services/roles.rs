//! Role service: roles and employee-role assignments.

use qore_core::models::{EmployeeRole, NewEmployeeRole, NewRole, Role, RoleUpdate};
use qore_core::store::{Page, PageQuery, Store};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::Principal;
use crate::models::{AssignRoleRequest, CreateRoleRequest, UpdateRoleRequest};
use crate::validation::slugify;

fn role_not_found() -> AppError {
    AppError::NotFound("Role not found".into())
}

pub async fn get_role(store: &dyn Store, id: i64) -> AppResult<Role> {
    store.find_role(id).await?.ok_or_else(role_not_found)
}

pub async fn list_roles(store: &dyn Store, query: &PageQuery) -> AppResult<Page<Role>> {
    Ok(store.list_roles(query).await?)
}

pub async fn create_role(
    store: &dyn Store,
    request: CreateRoleRequest,
    principal: &Principal,
) -> AppResult<Role> {
    let slug = request
        .slug
        .clone()
        .unwrap_or_else(|| slugify(&request.name));
    if slug.is_empty() {
        return Err(AppError::invalid("Role name must contain letters or digits"));
    }
    if store.find_role_by_slug(&slug).await?.is_some() {
        return Err(AppError::Conflict("Role with this slug already exists".into()));
    }
    let role = store
        .insert_role(NewRole {
            name: request.name.trim().to_string(),
            slug,
            description: request.description,
            is_system: false,
            is_active: request.is_active,
            created_by: Some(principal.id),
        })
        .await?;
    info!(role = role.id, slug = %role.slug, by = principal.id, "role created");
    Ok(role)
}

/// Update a role. System roles keep their name and slug.
pub async fn update_role(
    store: &dyn Store,
    id: i64,
    request: UpdateRoleRequest,
    principal: &Principal,
) -> AppResult<Role> {
    let role = get_role(store, id).await?;
    if role.is_system && (request.name.is_some() || request.slug.is_some()) {
        return Err(AppError::Forbidden("System roles cannot be renamed".into()));
    }
    if let Some(slug) = &request.slug
        && let Some(existing) = store.find_role_by_slug(slug).await?
        && existing.id != id
    {
        return Err(AppError::Conflict("Role with this slug already exists".into()));
    }
    let role = store
        .update_role(
            id,
            RoleUpdate {
                name: request.name.map(|n| n.trim().to_string()),
                slug: request.slug,
                description: request.description,
                is_active: request.is_active,
                updated_by: Some(principal.id),
            },
        )
        .await?;
    info!(role = role.id, by = principal.id, "role updated");
    Ok(role)
}

/// Soft-delete a role. System roles are refused and left untouched.
pub async fn delete_role(store: &dyn Store, id: i64, principal: &Principal) -> AppResult<()> {
    let role = get_role(store, id).await?;
    if role.is_system {
        return Err(AppError::Forbidden("System roles cannot be deleted".into()));
    }
    store.soft_delete_role(id, Some(principal.id)).await?;
    info!(role = id, by = principal.id, "role deleted");
    Ok(())
}

pub async fn list_employee_roles(store: &dyn Store, employee_id: i64) -> AppResult<Vec<EmployeeRole>> {
    ensure_employee(store, employee_id).await?;
    Ok(store.list_employee_roles(employee_id).await?)
}

/// Assign a role to an employee. A primary assignment demotes any previous
/// primary in the same atomic step.
pub async fn assign_role(
    store: &dyn Store,
    employee_id: i64,
    request: AssignRoleRequest,
    principal: &Principal,
) -> AppResult<EmployeeRole> {
    ensure_employee(store, employee_id).await?;
    get_role(store, request.role_id).await?;
    let assignment = store
        .assign_role(NewEmployeeRole {
            employee_id,
            role_id: request.role_id,
            is_primary: request.is_primary,
            assigned_by: Some(principal.id),
        })
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => {
                AppError::Conflict("Role is already assigned to this employee".into())
            }
            other => other,
        })?;
    info!(
        employee = employee_id,
        role = request.role_id,
        primary = assignment.is_primary,
        by = principal.id,
        "role assigned"
    );
    Ok(assignment)
}

pub async fn set_primary_role(
    store: &dyn Store,
    employee_id: i64,
    assignment_id: i64,
) -> AppResult<EmployeeRole> {
    ensure_employee(store, employee_id).await?;
    Ok(store.set_primary_role(employee_id, assignment_id).await?)
}

pub async fn remove_employee_role(
    store: &dyn Store,
    employee_id: i64,
    assignment_id: i64,
) -> AppResult<()> {
    ensure_employee(store, employee_id).await?;
    store.remove_employee_role(employee_id, assignment_id).await?;
    Ok(())
}

async fn ensure_employee(store: &dyn Store, employee_id: i64) -> AppResult<()> {
    match store.find_employee_by_id(employee_id).await? {
        Some(_) => Ok(()),
        None => Err(AppError::NotFound("Employee not found".into())),
    }
}
