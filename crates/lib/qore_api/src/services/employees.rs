//! Employee service: read side of the credential store plus account
//! creation.

use qore_core::auth::password::hash_password;
use qore_core::models::{Employee, NewEmployee};
use qore_core::org_chart::OrgChart;
use qore_core::store::{Page, PageQuery, Store};
use tracing::info;

use crate::config::ApiConfig;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::Principal;
use crate::models::CreateEmployeeRequest;

fn not_found() -> AppError {
    AppError::NotFound("Employee not found".into())
}

pub async fn get_employee(store: &dyn Store, id: i64) -> AppResult<Employee> {
    store.find_employee_by_id(id).await?.ok_or_else(not_found)
}

pub async fn list_employees(store: &dyn Store, query: &PageQuery) -> AppResult<Page<Employee>> {
    Ok(store.list_employees(query).await?)
}

/// Employees reporting directly to `id`.
pub async fn direct_reports(store: &dyn Store, id: i64) -> AppResult<Vec<Employee>> {
    let chart = OrgChart::from_employees(store.all_employees().await?);
    if chart.get(id).is_none() {
        return Err(not_found());
    }
    Ok(chart.direct_reports(id).into_iter().cloned().collect())
}

/// Create an employee account. The password is hashed before it reaches the
/// store.
pub async fn create_employee(
    store: &dyn Store,
    config: &ApiConfig,
    request: CreateEmployeeRequest,
    created_by: Option<&Principal>,
) -> AppResult<Employee> {
    let email = request.email.trim().to_string();
    let employee_id = request.employee_id.trim().to_string();

    if store.find_employee_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("Employee with this email already exists".into()));
    }
    if store
        .find_employee_by_employee_id(&employee_id)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict(
            "Employee with this employee ID already exists".into(),
        ));
    }
    if let Some(manager) = request.reporting_to
        && store.find_employee_by_id(manager).await?.is_none()
    {
        return Err(AppError::NotFound("Reporting manager not found".into()));
    }

    let password_hash = hash_password(&request.password, config.bcrypt_cost)?;
    let employee = store
        .insert_employee(NewEmployee {
            employee_id,
            first_name: request.first_name.trim().to_string(),
            last_name: request.last_name.trim().to_string(),
            email,
            password_hash,
            phone: request.phone,
            branch_id: request.branch_id,
            department_id: request.department_id,
            designation_id: request.designation_id,
            reporting_to: request.reporting_to,
            is_active: request.is_active,
            is_superadmin: request.is_superadmin,
            created_by: created_by.map(|p| p.id),
        })
        .await?;

    info!(employee = employee.id, code = %employee.employee_id, "employee created");
    Ok(employee)
}

/// Managers of `id`, nearest first. Stops at a cycle.
pub async fn reporting_chain(store: &dyn Store, id: i64) -> AppResult<Vec<Employee>> {
    let chart = OrgChart::from_employees(store.all_employees().await?);
    if chart.get(id).is_none() {
        return Err(not_found());
    }
    Ok(chart.reporting_chain(id).into_iter().cloned().collect())
}
