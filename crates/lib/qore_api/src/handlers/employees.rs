//! Employee handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use qore_core::models::Employee;
use qore_core::store::PageQuery;
use validator::Validate;

use crate::AppState;
use crate::error::AppResult;
use crate::extract::{ValidatedJson, ValidatedPath, ValidatedQuery};
use crate::middleware::auth::{Principal, require_superadmin};
use crate::models::{ApiResponse, CreateEmployeeRequest, EmployeeData, ListQuery, Paginated};
use crate::services::employees;

/// `GET /api/employees`
pub async fn list_employees_handler(
    State(state): State<AppState>,
    ValidatedQuery(query): ValidatedQuery<ListQuery>,
) -> AppResult<Json<ApiResponse<Paginated<Employee>>>> {
    let query = PageQuery::new(query.page, query.limit, query.search);
    let page = employees::list_employees(state.store.as_ref(), &query).await?;
    Ok(Json(ApiResponse::ok(
        "Employees retrieved successfully",
        page.into(),
    )))
}

/// `GET /api/employees/{id}`
pub async fn get_employee_handler(
    State(state): State<AppState>,
    ValidatedPath(id): ValidatedPath<i64>,
) -> AppResult<Json<ApiResponse<EmployeeData>>> {
    let employee = employees::get_employee(state.store.as_ref(), id).await?;
    Ok(Json(ApiResponse::ok(
        "Employee retrieved successfully",
        EmployeeData { employee },
    )))
}

/// `GET /api/employees/{id}/reports`
pub async fn direct_reports_handler(
    State(state): State<AppState>,
    ValidatedPath(id): ValidatedPath<i64>,
) -> AppResult<Json<ApiResponse<Vec<Employee>>>> {
    let reports = employees::direct_reports(state.store.as_ref(), id).await?;
    Ok(Json(ApiResponse::ok(
        "Direct reports retrieved successfully",
        reports,
    )))
}

/// `GET /api/employees/{id}/chain`: managers from the direct one upward.
pub async fn reporting_chain_handler(
    State(state): State<AppState>,
    ValidatedPath(id): ValidatedPath<i64>,
) -> AppResult<Json<ApiResponse<Vec<Employee>>>> {
    let chain = employees::reporting_chain(state.store.as_ref(), id).await?;
    Ok(Json(ApiResponse::ok(
        "Reporting chain retrieved successfully",
        chain,
    )))
}

/// `POST /api/employees`: superadmin only.
pub async fn create_employee_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    ValidatedJson(body): ValidatedJson<CreateEmployeeRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<EmployeeData>>)> {
    require_superadmin(&principal)?;
    body.validate()?;
    let employee =
        employees::create_employee(state.store.as_ref(), &state.config, body, Some(&principal))
            .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            "Employee created successfully",
            EmployeeData { employee },
        )),
    ))
}
