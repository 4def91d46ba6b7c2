//! Persistence layer.
//!
//! The service layer talks to storage only through the traits below. Two
//! implementations exist: [`PgStore`] for PostgreSQL and [`MemoryStore`] for
//! tests and throwaway dev runs. Multi-step writes whose intermediate state
//! must not be observable (refresh rotation, primary-role demotion) are single
//! trait methods so each implementation can make them atomic.
//!
//! Lookups never return soft-deleted rows unless the method name says so.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{
    Employee, EmployeeRole, NewEmployee, NewEmployeeRole, NewRefreshToken, NewRole, RefreshToken,
    Role, RoleUpdate,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Default page size for list queries.
pub const DEFAULT_PAGE_LIMIT: u32 = 10;

/// Largest page size a caller may request.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Pagination and substring filter for list queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    /// 1-based page number.
    pub page: u32,
    pub limit: u32,
    /// Case-insensitive substring filter.
    pub search: Option<String>,
}

impl PageQuery {
    /// Build a query, clamping page and limit into their valid ranges and
    /// dropping blank search terms.
    pub fn new(page: Option<u32>, limit: Option<u32>, search: Option<String>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT),
            search: search
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }

    /// `%term%` pattern for `ILIKE`, with LIKE metacharacters escaped.
    pub fn like_pattern(&self) -> Option<String> {
        self.search.as_ref().map(|s| {
            let escaped = s
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            format!("%{escaped}%")
        })
    }

    /// In-memory equivalent of the `ILIKE` filter.
    pub fn matches(&self, fields: &[&str]) -> bool {
        match &self.search {
            None => true,
            Some(term) => {
                let term = term.to_lowercase();
                fields.iter().any(|f| f.to_lowercase().contains(&term))
            }
        }
    }
}

impl Default for PageQuery {
    fn default() -> Self {
        Self::new(None, None, None)
    }
}

/// One page of results plus the unpaged total.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> i64 {
        let limit = i64::from(self.limit);
        (self.total + limit - 1) / limit
    }
}

/// Credential store.
#[async_trait]
pub trait EmployeeStore: Send + Sync {
    /// Insert an employee. Duplicate email or employee code among live rows
    /// is a `Conflict`.
    async fn insert_employee(&self, new: NewEmployee) -> StoreResult<Employee>;

    async fn find_employee_by_id(&self, id: i64) -> StoreResult<Option<Employee>>;

    async fn find_employee_by_email(&self, email: &str) -> StoreResult<Option<Employee>>;

    async fn find_employee_by_employee_id(&self, employee_id: &str)
    -> StoreResult<Option<Employee>>;

    async fn list_employees(&self, query: &PageQuery) -> StoreResult<Page<Employee>>;

    /// Every live employee, for building an org chart.
    async fn all_employees(&self) -> StoreResult<Vec<Employee>>;

    async fn update_password_hash(
        &self,
        id: i64,
        password_hash: &str,
        updated_by: Option<i64>,
    ) -> StoreResult<()>;

    async fn touch_last_login(&self, id: i64, at: DateTime<Utc>) -> StoreResult<()>;

    async fn soft_delete_employee(&self, id: i64, deleted_by: Option<i64>) -> StoreResult<()>;
}

/// Refresh-token ledger.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn insert_refresh_token(&self, new: NewRefreshToken) -> StoreResult<RefreshToken>;

    /// Find a token row that has not been revoked. The row may be expired.
    async fn find_active_refresh_token(&self, token: &str) -> StoreResult<Option<RefreshToken>>;

    /// Find a token row in any state.
    async fn find_refresh_token(&self, token: &str) -> StoreResult<Option<RefreshToken>>;

    /// Revoke a token if it is not already revoked. Returns whether a row
    /// changed.
    async fn revoke_refresh_token(&self, token: &str, ip: Option<&str>) -> StoreResult<bool>;

    /// Atomically replace `old` with `new`: insert the successor and revoke
    /// the old row, linking it via `replaced_by_token`. Returns `None`, with
    /// nothing written, when `old` is missing or already revoked.
    async fn rotate_refresh_token(
        &self,
        old: &str,
        new: NewRefreshToken,
        ip: Option<&str>,
    ) -> StoreResult<Option<RefreshToken>>;

    /// Revoke every unrevoked token of an employee. Returns the count.
    async fn revoke_all_refresh_tokens(&self, employee_id: i64, ip: Option<&str>)
    -> StoreResult<u64>;

    async fn list_refresh_tokens_for_employee(
        &self,
        employee_id: i64,
    ) -> StoreResult<Vec<RefreshToken>>;
}

/// Roles and employee-role assignments.
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Insert a role. A duplicate live slug is a `Conflict`.
    async fn insert_role(&self, new: NewRole) -> StoreResult<Role>;

    async fn find_role(&self, id: i64) -> StoreResult<Option<Role>>;

    async fn find_role_by_slug(&self, slug: &str) -> StoreResult<Option<Role>>;

    async fn list_roles(&self, query: &PageQuery) -> StoreResult<Page<Role>>;

    async fn update_role(&self, id: i64, update: RoleUpdate) -> StoreResult<Role>;

    async fn soft_delete_role(&self, id: i64, deleted_by: Option<i64>) -> StoreResult<()>;

    /// Assign a role. When the assignment is primary, or is the employee's
    /// first live assignment, every other primary of that employee is
    /// demoted in the same atomic step. A live duplicate is a `Conflict`.
    async fn assign_role(&self, new: NewEmployeeRole) -> StoreResult<EmployeeRole>;

    /// Make an existing assignment the employee's only primary one.
    async fn set_primary_role(&self, employee_id: i64, assignment_id: i64)
    -> StoreResult<EmployeeRole>;

    async fn list_employee_roles(&self, employee_id: i64) -> StoreResult<Vec<EmployeeRole>>;

    async fn remove_employee_role(&self, employee_id: i64, assignment_id: i64) -> StoreResult<()>;
}

/// Everything the API needs from storage.
pub trait Store: EmployeeStore + RefreshTokenStore + RoleStore {}

impl<T> Store for T where T: EmployeeStore + RefreshTokenStore + RoleStore {}
