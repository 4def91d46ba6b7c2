//! In-memory store.
//!
//! All tables sit behind one mutex, so every trait method is a single
//! critical section and multi-step writes are atomic by construction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{
    EmployeeStore, Page, PageQuery, RefreshTokenStore, RoleStore, StoreError, StoreResult,
};
use crate::models::{
    Employee, EmployeeRole, NewEmployee, NewEmployeeRole, NewRefreshToken, NewRole, RefreshToken,
    Role, RoleUpdate, SoftDeletable,
};

#[derive(Debug, Default)]
struct Tables {
    employees: Vec<Employee>,
    refresh_tokens: Vec<RefreshToken>,
    roles: Vec<Role>,
    employee_roles: Vec<EmployeeRole>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn live_employee_mut(&mut self, id: i64) -> StoreResult<&mut Employee> {
        self.employees
            .iter_mut()
            .find(|e| e.id == id && !e.is_deleted())
            .ok_or_else(|| StoreError::NotFound(format!("employee {id}")))
    }

    fn live_role_mut(&mut self, id: i64) -> StoreResult<&mut Role> {
        self.roles
            .iter_mut()
            .find(|r| r.id == id && !r.is_deleted())
            .ok_or_else(|| StoreError::NotFound(format!("role {id}")))
    }

    fn slug_taken(&self, slug: &str, except: Option<i64>) -> bool {
        self.roles
            .iter()
            .any(|r| !r.is_deleted() && r.slug == slug && Some(r.id) != except)
    }

    fn demote_primaries(&mut self, employee_id: i64, now: DateTime<Utc>) {
        for er in self
            .employee_roles
            .iter_mut()
            .filter(|er| er.employee_id == employee_id && er.is_primary && !er.is_deleted())
        {
            er.is_primary = false;
            er.updated_at = now;
        }
    }
}

fn paginate<T: Clone>(rows: Vec<&T>, query: &PageQuery) -> Page<T> {
    let total = rows.len() as i64;
    let items = rows
        .into_iter()
        .skip(query.offset() as usize)
        .take(query.limit as usize)
        .cloned()
        .collect();
    Page {
        items,
        total,
        page: query.page,
        limit: query.limit,
    }
}

/// Store backed by process memory. Contents are lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a refresh token's expiry. Lets tests age a token.
    pub async fn set_refresh_token_expiry(&self, token: &str, expires_at: DateTime<Utc>) -> bool {
        let mut tables = self.tables.lock().await;
        match tables.refresh_tokens.iter_mut().find(|t| t.token == token) {
            Some(row) => {
                row.expires_at = expires_at;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl EmployeeStore for MemoryStore {
    async fn insert_employee(&self, new: NewEmployee) -> StoreResult<Employee> {
        let mut tables = self.tables.lock().await;
        let live = tables.employees.iter().filter(|e| !e.is_deleted());
        for e in live {
            if e.email.eq_ignore_ascii_case(&new.email) {
                return Err(StoreError::Conflict("email already exists".into()));
            }
            if e.employee_id == new.employee_id {
                return Err(StoreError::Conflict("employee_id already exists".into()));
            }
        }
        let now = Utc::now();
        let employee = Employee {
            id: tables.next_id(),
            employee_id: new.employee_id,
            first_name: new.first_name,
            last_name: new.last_name,
            email: new.email,
            password_hash: new.password_hash,
            phone: new.phone,
            branch_id: new.branch_id,
            department_id: new.department_id,
            designation_id: new.designation_id,
            reporting_to: new.reporting_to,
            is_active: new.is_active,
            is_superadmin: new.is_superadmin,
            last_login: None,
            created_by: new.created_by,
            updated_by: new.created_by,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        tables.employees.push(employee.clone());
        Ok(employee)
    }

    async fn find_employee_by_id(&self, id: i64) -> StoreResult<Option<Employee>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .employees
            .iter()
            .find(|e| e.id == id && !e.is_deleted())
            .cloned())
    }

    async fn find_employee_by_email(&self, email: &str) -> StoreResult<Option<Employee>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .employees
            .iter()
            .find(|e| e.email.eq_ignore_ascii_case(email) && !e.is_deleted())
            .cloned())
    }

    async fn find_employee_by_employee_id(
        &self,
        employee_id: &str,
    ) -> StoreResult<Option<Employee>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .employees
            .iter()
            .find(|e| e.employee_id == employee_id && !e.is_deleted())
            .cloned())
    }

    async fn list_employees(&self, query: &PageQuery) -> StoreResult<Page<Employee>> {
        let tables = self.tables.lock().await;
        let rows = tables
            .employees
            .iter()
            .filter(|e| !e.is_deleted())
            .filter(|e| {
                query.matches(&[
                    e.first_name.as_str(),
                    e.last_name.as_str(),
                    e.email.as_str(),
                    e.employee_id.as_str(),
                ])
            })
            .collect();
        Ok(paginate(rows, query))
    }

    async fn all_employees(&self) -> StoreResult<Vec<Employee>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .employees
            .iter()
            .filter(|e| !e.is_deleted())
            .cloned()
            .collect())
    }

    async fn update_password_hash(
        &self,
        id: i64,
        password_hash: &str,
        updated_by: Option<i64>,
    ) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        let employee = tables.live_employee_mut(id)?;
        employee.password_hash = password_hash.to_string();
        employee.updated_by = updated_by;
        employee.updated_at = Utc::now();
        Ok(())
    }

    async fn touch_last_login(&self, id: i64, at: DateTime<Utc>) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        tables.live_employee_mut(id)?.last_login = Some(at);
        Ok(())
    }

    async fn soft_delete_employee(&self, id: i64, deleted_by: Option<i64>) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        let employee = tables.live_employee_mut(id)?;
        let now = Utc::now();
        employee.deleted_at = Some(now);
        employee.updated_by = deleted_by;
        employee.updated_at = now;
        Ok(())
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryStore {
    async fn insert_refresh_token(&self, new: NewRefreshToken) -> StoreResult<RefreshToken> {
        let mut tables = self.tables.lock().await;
        if tables.refresh_tokens.iter().any(|t| t.token == new.token) {
            return Err(StoreError::Conflict("refresh token already exists".into()));
        }
        let now = Utc::now();
        let row = RefreshToken {
            id: tables.next_id(),
            token: new.token,
            employee_id: new.employee_id,
            expires_at: new.expires_at,
            is_revoked: false,
            created_by_ip: new.created_by_ip,
            revoked_by_ip: None,
            revoked_at: None,
            replaced_by_token: None,
            created_at: now,
            updated_at: now,
        };
        tables.refresh_tokens.push(row.clone());
        Ok(row)
    }

    async fn find_active_refresh_token(&self, token: &str) -> StoreResult<Option<RefreshToken>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .refresh_tokens
            .iter()
            .find(|t| t.token == token && !t.is_revoked)
            .cloned())
    }

    async fn find_refresh_token(&self, token: &str) -> StoreResult<Option<RefreshToken>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .refresh_tokens
            .iter()
            .find(|t| t.token == token)
            .cloned())
    }

    async fn revoke_refresh_token(&self, token: &str, ip: Option<&str>) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        match tables
            .refresh_tokens
            .iter_mut()
            .find(|t| t.token == token && !t.is_revoked)
        {
            Some(row) => {
                let now = Utc::now();
                row.is_revoked = true;
                row.revoked_at = Some(now);
                row.revoked_by_ip = ip.map(str::to_string);
                row.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn rotate_refresh_token(
        &self,
        old: &str,
        new: NewRefreshToken,
        ip: Option<&str>,
    ) -> StoreResult<Option<RefreshToken>> {
        let mut tables = self.tables.lock().await;
        let Some(idx) = tables
            .refresh_tokens
            .iter()
            .position(|t| t.token == old && !t.is_revoked)
        else {
            return Ok(None);
        };
        if tables.refresh_tokens.iter().any(|t| t.token == new.token) {
            return Err(StoreError::Conflict("refresh token already exists".into()));
        }

        let now = Utc::now();
        let successor = RefreshToken {
            id: tables.next_id(),
            token: new.token,
            employee_id: new.employee_id,
            expires_at: new.expires_at,
            is_revoked: false,
            created_by_ip: new.created_by_ip,
            revoked_by_ip: None,
            revoked_at: None,
            replaced_by_token: None,
            created_at: now,
            updated_at: now,
        };

        let old_row = &mut tables.refresh_tokens[idx];
        old_row.is_revoked = true;
        old_row.revoked_at = Some(now);
        old_row.revoked_by_ip = ip.map(str::to_string);
        old_row.replaced_by_token = Some(successor.token.clone());
        old_row.updated_at = now;

        tables.refresh_tokens.push(successor.clone());
        Ok(Some(successor))
    }

    async fn revoke_all_refresh_tokens(
        &self,
        employee_id: i64,
        ip: Option<&str>,
    ) -> StoreResult<u64> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();
        let mut count = 0;
        for row in tables
            .refresh_tokens
            .iter_mut()
            .filter(|t| t.employee_id == employee_id && !t.is_revoked)
        {
            row.is_revoked = true;
            row.revoked_at = Some(now);
            row.revoked_by_ip = ip.map(str::to_string);
            row.updated_at = now;
            count += 1;
        }
        Ok(count)
    }

    async fn list_refresh_tokens_for_employee(
        &self,
        employee_id: i64,
    ) -> StoreResult<Vec<RefreshToken>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .refresh_tokens
            .iter()
            .filter(|t| t.employee_id == employee_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RoleStore for MemoryStore {
    async fn insert_role(&self, new: NewRole) -> StoreResult<Role> {
        let mut tables = self.tables.lock().await;
        if tables.slug_taken(&new.slug, None) {
            return Err(StoreError::Conflict("role slug already exists".into()));
        }
        let now = Utc::now();
        let role = Role {
            id: tables.next_id(),
            name: new.name,
            slug: new.slug,
            description: new.description,
            is_system: new.is_system,
            is_active: new.is_active,
            created_by: new.created_by,
            updated_by: new.created_by,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        tables.roles.push(role.clone());
        Ok(role)
    }

    async fn find_role(&self, id: i64) -> StoreResult<Option<Role>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .roles
            .iter()
            .find(|r| r.id == id && !r.is_deleted())
            .cloned())
    }

    async fn find_role_by_slug(&self, slug: &str) -> StoreResult<Option<Role>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .roles
            .iter()
            .find(|r| r.slug == slug && !r.is_deleted())
            .cloned())
    }

    async fn list_roles(&self, query: &PageQuery) -> StoreResult<Page<Role>> {
        let tables = self.tables.lock().await;
        let rows = tables
            .roles
            .iter()
            .filter(|r| !r.is_deleted())
            .filter(|r| query.matches(&[r.name.as_str(), r.slug.as_str()]))
            .collect();
        Ok(paginate(rows, query))
    }

    async fn update_role(&self, id: i64, update: RoleUpdate) -> StoreResult<Role> {
        let mut tables = self.tables.lock().await;
        if let Some(slug) = &update.slug
            && tables.slug_taken(slug, Some(id))
        {
            return Err(StoreError::Conflict("role slug already exists".into()));
        }
        let role = tables.live_role_mut(id)?;
        if let Some(name) = update.name {
            role.name = name;
        }
        if let Some(slug) = update.slug {
            role.slug = slug;
        }
        if let Some(description) = update.description {
            role.description = Some(description);
        }
        if let Some(is_active) = update.is_active {
            role.is_active = is_active;
        }
        role.updated_by = update.updated_by;
        role.updated_at = Utc::now();
        Ok(role.clone())
    }

    async fn soft_delete_role(&self, id: i64, deleted_by: Option<i64>) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        let role = tables.live_role_mut(id)?;
        let now = Utc::now();
        role.deleted_at = Some(now);
        role.updated_by = deleted_by;
        role.updated_at = now;
        Ok(())
    }

    async fn assign_role(&self, new: NewEmployeeRole) -> StoreResult<EmployeeRole> {
        let mut tables = self.tables.lock().await;
        let live: Vec<&EmployeeRole> = tables
            .employee_roles
            .iter()
            .filter(|er| er.employee_id == new.employee_id && !er.is_deleted())
            .collect();
        if live.iter().any(|er| er.role_id == new.role_id) {
            return Err(StoreError::Conflict("role already assigned".into()));
        }
        let is_primary = new.is_primary || live.is_empty();

        let now = Utc::now();
        if is_primary {
            tables.demote_primaries(new.employee_id, now);
        }
        let assignment = EmployeeRole {
            id: tables.next_id(),
            employee_id: new.employee_id,
            role_id: new.role_id,
            is_primary,
            assigned_by: new.assigned_by,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        tables.employee_roles.push(assignment.clone());
        Ok(assignment)
    }

    async fn set_primary_role(
        &self,
        employee_id: i64,
        assignment_id: i64,
    ) -> StoreResult<EmployeeRole> {
        let mut tables = self.tables.lock().await;
        let idx = tables
            .employee_roles
            .iter()
            .position(|er| {
                er.id == assignment_id && er.employee_id == employee_id && !er.is_deleted()
            })
            .ok_or_else(|| StoreError::NotFound(format!("role assignment {assignment_id}")))?;
        let now = Utc::now();
        tables.demote_primaries(employee_id, now);
        let row = &mut tables.employee_roles[idx];
        row.is_primary = true;
        row.updated_at = now;
        Ok(row.clone())
    }

    async fn list_employee_roles(&self, employee_id: i64) -> StoreResult<Vec<EmployeeRole>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .employee_roles
            .iter()
            .filter(|er| er.employee_id == employee_id && !er.is_deleted())
            .cloned()
            .collect())
    }

    async fn remove_employee_role(&self, employee_id: i64, assignment_id: i64) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        let row = tables
            .employee_roles
            .iter_mut()
            .find(|er| er.id == assignment_id && er.employee_id == employee_id && !er.is_deleted())
            .ok_or_else(|| StoreError::NotFound(format!("role assignment {assignment_id}")))?;
        let now = Utc::now();
        let was_primary = row.is_primary;
        row.deleted_at = Some(now);
        row.is_primary = false;
        row.updated_at = now;

        // Hand the primary flag to the oldest remaining assignment.
        if was_primary
            && let Some(next) = tables
                .employee_roles
                .iter_mut()
                .filter(|er| er.employee_id == employee_id && !er.is_deleted())
                .min_by_key(|er| er.id)
        {
            next.is_primary = true;
            next.updated_at = now;
        }
        Ok(())
    }
}
