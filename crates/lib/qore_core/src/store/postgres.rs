//! PostgreSQL store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use super::{
    EmployeeStore, Page, PageQuery, RefreshTokenStore, RoleStore, StoreError, StoreResult,
};
use crate::models::{
    Employee, EmployeeRole, NewEmployee, NewEmployeeRole, NewRefreshToken, NewRole, RefreshToken,
    Role, RoleUpdate,
};

const EMPLOYEE_COLUMNS: &str = "id, employee_id, first_name, last_name, email, password, phone, \
     branch_id, department_id, designation_id, reporting_to, is_active, is_superadmin, \
     last_login, created_by, updated_by, created_at, updated_at, deleted_at";

const REFRESH_TOKEN_COLUMNS: &str = "id, token, employee_id, expires_at, is_revoked, \
     created_by_ip, revoked_by_ip, revoked_at, replaced_by_token, created_at, updated_at";

const ROLE_COLUMNS: &str = "id, name, slug, description, is_system, is_active, created_by, \
     updated_by, created_at, updated_at, deleted_at";

const EMPLOYEE_ROLE_COLUMNS: &str =
    "id, employee_id, role_id, is_primary, assigned_by, created_at, updated_at, deleted_at";

/// Map a unique-index violation to `Conflict`, anything else to `Database`.
fn conflict_on_unique(e: sqlx::Error, what: &str) -> StoreError {
    if let sqlx::Error::Database(db) = &e
        && db.is_unique_violation()
    {
        return StoreError::Conflict(format!("{what} already exists"));
    }
    StoreError::Database(e)
}

/// Lock the employee row for the rest of the transaction. Assignment writes
/// for one employee serialize here, including the first one when no
/// `employee_roles` row exists yet to lock.
async fn lock_employee(conn: &mut PgConnection, employee_id: i64) -> StoreResult<()> {
    sqlx::query_scalar::<_, i64>("SELECT id FROM employees WHERE id = $1 FOR NO KEY UPDATE")
        .bind(employee_id)
        .fetch_optional(conn)
        .await?
        .map(|_| ())
        .ok_or_else(|| StoreError::NotFound(format!("employee {employee_id}")))
}

/// Store backed by a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EmployeeStore for PgStore {
    async fn insert_employee(&self, new: NewEmployee) -> StoreResult<Employee> {
        let sql = format!(
            "INSERT INTO employees (employee_id, first_name, last_name, email, password, phone, \
             branch_id, department_id, designation_id, reporting_to, is_active, is_superadmin, \
             created_by, updated_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13) \
             RETURNING {EMPLOYEE_COLUMNS}"
        );
        sqlx::query_as::<_, Employee>(&sql)
            .bind(&new.employee_id)
            .bind(&new.first_name)
            .bind(&new.last_name)
            .bind(&new.email)
            .bind(&new.password_hash)
            .bind(&new.phone)
            .bind(new.branch_id)
            .bind(new.department_id)
            .bind(new.designation_id)
            .bind(new.reporting_to)
            .bind(new.is_active)
            .bind(new.is_superadmin)
            .bind(new.created_by)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, "employee"))
    }

    async fn find_employee_by_id(&self, id: i64) -> StoreResult<Option<Employee>> {
        let sql = format!(
            "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = $1 AND deleted_at IS NULL"
        );
        Ok(sqlx::query_as::<_, Employee>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_employee_by_email(&self, email: &str) -> StoreResult<Option<Employee>> {
        let sql = format!(
            "SELECT {EMPLOYEE_COLUMNS} FROM employees \
             WHERE lower(email) = lower($1) AND deleted_at IS NULL"
        );
        Ok(sqlx::query_as::<_, Employee>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_employee_by_employee_id(
        &self,
        employee_id: &str,
    ) -> StoreResult<Option<Employee>> {
        let sql = format!(
            "SELECT {EMPLOYEE_COLUMNS} FROM employees \
             WHERE employee_id = $1 AND deleted_at IS NULL"
        );
        Ok(sqlx::query_as::<_, Employee>(&sql)
            .bind(employee_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_employees(&self, query: &PageQuery) -> StoreResult<Page<Employee>> {
        let filter = "deleted_at IS NULL AND ($1::text IS NULL \
             OR first_name ILIKE $1 OR last_name ILIKE $1 \
             OR email ILIKE $1 OR employee_id ILIKE $1)";
        let pattern = query.like_pattern();

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM employees WHERE {filter}"
        ))
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let items = sqlx::query_as::<_, Employee>(&format!(
            "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE {filter} \
             ORDER BY id LIMIT $2 OFFSET $3"
        ))
        .bind(&pattern)
        .bind(i64::from(query.limit))
        .bind(query.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page {
            items,
            total,
            page: query.page,
            limit: query.limit,
        })
    }

    async fn all_employees(&self) -> StoreResult<Vec<Employee>> {
        let sql =
            format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE deleted_at IS NULL ORDER BY id");
        Ok(sqlx::query_as::<_, Employee>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn update_password_hash(
        &self,
        id: i64,
        password_hash: &str,
        updated_by: Option<i64>,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE employees SET password = $2, updated_by = $3, updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(password_hash)
        .bind(updated_by)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("employee {id}")));
        }
        Ok(())
    }

    async fn touch_last_login(&self, id: i64, at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query("UPDATE employees SET last_login = $2 WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn soft_delete_employee(&self, id: i64, deleted_by: Option<i64>) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE employees SET deleted_at = now(), updated_at = now(), updated_by = $2 \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(deleted_by)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("employee {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl RefreshTokenStore for PgStore {
    async fn insert_refresh_token(&self, new: NewRefreshToken) -> StoreResult<RefreshToken> {
        let sql = format!(
            "INSERT INTO refresh_tokens (token, employee_id, expires_at, created_by_ip) \
             VALUES ($1, $2, $3, $4) RETURNING {REFRESH_TOKEN_COLUMNS}"
        );
        sqlx::query_as::<_, RefreshToken>(&sql)
            .bind(&new.token)
            .bind(new.employee_id)
            .bind(new.expires_at)
            .bind(&new.created_by_ip)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, "refresh token"))
    }

    async fn find_active_refresh_token(&self, token: &str) -> StoreResult<Option<RefreshToken>> {
        let sql = format!(
            "SELECT {REFRESH_TOKEN_COLUMNS} FROM refresh_tokens \
             WHERE token = $1 AND is_revoked = FALSE"
        );
        Ok(sqlx::query_as::<_, RefreshToken>(&sql)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_refresh_token(&self, token: &str) -> StoreResult<Option<RefreshToken>> {
        let sql = format!("SELECT {REFRESH_TOKEN_COLUMNS} FROM refresh_tokens WHERE token = $1");
        Ok(sqlx::query_as::<_, RefreshToken>(&sql)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn revoke_refresh_token(&self, token: &str, ip: Option<&str>) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE refresh_tokens \
             SET is_revoked = TRUE, revoked_at = now(), revoked_by_ip = $2, updated_at = now() \
             WHERE token = $1 AND is_revoked = FALSE",
        )
        .bind(token)
        .bind(ip)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn rotate_refresh_token(
        &self,
        old: &str,
        new: NewRefreshToken,
        ip: Option<&str>,
    ) -> StoreResult<Option<RefreshToken>> {
        let mut tx = self.pool.begin().await?;

        // Row lock: a concurrent rotation of the same token blocks here and
        // then sees it revoked.
        let locked = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM refresh_tokens WHERE token = $1 AND is_revoked = FALSE FOR UPDATE",
        )
        .bind(old)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(old_id) = locked else {
            tx.rollback().await?;
            return Ok(None);
        };

        let sql = format!(
            "INSERT INTO refresh_tokens (token, employee_id, expires_at, created_by_ip) \
             VALUES ($1, $2, $3, $4) RETURNING {REFRESH_TOKEN_COLUMNS}"
        );
        let successor = sqlx::query_as::<_, RefreshToken>(&sql)
            .bind(&new.token)
            .bind(new.employee_id)
            .bind(new.expires_at)
            .bind(&new.created_by_ip)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| conflict_on_unique(e, "refresh token"))?;

        sqlx::query(
            "UPDATE refresh_tokens \
             SET is_revoked = TRUE, revoked_at = now(), revoked_by_ip = $2, \
                 replaced_by_token = $3, updated_at = now() \
             WHERE id = $1",
        )
        .bind(old_id)
        .bind(ip)
        .bind(&successor.token)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(successor))
    }

    async fn revoke_all_refresh_tokens(
        &self,
        employee_id: i64,
        ip: Option<&str>,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE refresh_tokens \
             SET is_revoked = TRUE, revoked_at = now(), revoked_by_ip = $2, updated_at = now() \
             WHERE employee_id = $1 AND is_revoked = FALSE",
        )
        .bind(employee_id)
        .bind(ip)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn list_refresh_tokens_for_employee(
        &self,
        employee_id: i64,
    ) -> StoreResult<Vec<RefreshToken>> {
        let sql = format!(
            "SELECT {REFRESH_TOKEN_COLUMNS} FROM refresh_tokens \
             WHERE employee_id = $1 ORDER BY created_at DESC"
        );
        Ok(sqlx::query_as::<_, RefreshToken>(&sql)
            .bind(employee_id)
            .fetch_all(&self.pool)
            .await?)
    }
}

#[async_trait]
impl RoleStore for PgStore {
    async fn insert_role(&self, new: NewRole) -> StoreResult<Role> {
        let sql = format!(
            "INSERT INTO roles (name, slug, description, is_system, is_active, created_by, updated_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $6) RETURNING {ROLE_COLUMNS}"
        );
        sqlx::query_as::<_, Role>(&sql)
            .bind(&new.name)
            .bind(&new.slug)
            .bind(&new.description)
            .bind(new.is_system)
            .bind(new.is_active)
            .bind(new.created_by)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, "role slug"))
    }

    async fn find_role(&self, id: i64) -> StoreResult<Option<Role>> {
        let sql = format!("SELECT {ROLE_COLUMNS} FROM roles WHERE id = $1 AND deleted_at IS NULL");
        Ok(sqlx::query_as::<_, Role>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_role_by_slug(&self, slug: &str) -> StoreResult<Option<Role>> {
        let sql =
            format!("SELECT {ROLE_COLUMNS} FROM roles WHERE slug = $1 AND deleted_at IS NULL");
        Ok(sqlx::query_as::<_, Role>(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_roles(&self, query: &PageQuery) -> StoreResult<Page<Role>> {
        let filter = "deleted_at IS NULL AND ($1::text IS NULL OR name ILIKE $1 OR slug ILIKE $1)";
        let pattern = query.like_pattern();

        let total =
            sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM roles WHERE {filter}"))
                .bind(&pattern)
                .fetch_one(&self.pool)
                .await?;

        let items = sqlx::query_as::<_, Role>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE {filter} ORDER BY id LIMIT $2 OFFSET $3"
        ))
        .bind(&pattern)
        .bind(i64::from(query.limit))
        .bind(query.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page {
            items,
            total,
            page: query.page,
            limit: query.limit,
        })
    }

    async fn update_role(&self, id: i64, update: RoleUpdate) -> StoreResult<Role> {
        let sql = format!(
            "UPDATE roles SET \
                 name = COALESCE($2, name), \
                 slug = COALESCE($3, slug), \
                 description = COALESCE($4, description), \
                 is_active = COALESCE($5, is_active), \
                 updated_by = $6, \
                 updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL \
             RETURNING {ROLE_COLUMNS}"
        );
        sqlx::query_as::<_, Role>(&sql)
            .bind(id)
            .bind(&update.name)
            .bind(&update.slug)
            .bind(&update.description)
            .bind(update.is_active)
            .bind(update.updated_by)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, "role slug"))?
            .ok_or_else(|| StoreError::NotFound(format!("role {id}")))
    }

    async fn soft_delete_role(&self, id: i64, deleted_by: Option<i64>) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE roles SET deleted_at = now(), updated_at = now(), updated_by = $2 \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(deleted_by)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("role {id}")));
        }
        Ok(())
    }

    async fn assign_role(&self, new: NewEmployeeRole) -> StoreResult<EmployeeRole> {
        let mut tx = self.pool.begin().await?;
        lock_employee(&mut *tx, new.employee_id).await?;

        let live = sqlx::query_as::<_, (i64, i64)>(
            "SELECT id, role_id FROM employee_roles \
             WHERE employee_id = $1 AND deleted_at IS NULL",
        )
        .bind(new.employee_id)
        .fetch_all(&mut *tx)
        .await?;
        if live.iter().any(|(_, role_id)| *role_id == new.role_id) {
            tx.rollback().await?;
            return Err(StoreError::Conflict("role already assigned".into()));
        }
        let is_primary = new.is_primary || live.is_empty();

        if is_primary {
            sqlx::query(
                "UPDATE employee_roles SET is_primary = FALSE, updated_at = now() \
                 WHERE employee_id = $1 AND is_primary AND deleted_at IS NULL",
            )
            .bind(new.employee_id)
            .execute(&mut *tx)
            .await?;
        }

        let sql = format!(
            "INSERT INTO employee_roles (employee_id, role_id, is_primary, assigned_by) \
             VALUES ($1, $2, $3, $4) RETURNING {EMPLOYEE_ROLE_COLUMNS}"
        );
        let assignment = sqlx::query_as::<_, EmployeeRole>(&sql)
            .bind(new.employee_id)
            .bind(new.role_id)
            .bind(is_primary)
            .bind(new.assigned_by)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| conflict_on_unique(e, "role assignment"))?;

        tx.commit().await?;
        Ok(assignment)
    }

    async fn set_primary_role(
        &self,
        employee_id: i64,
        assignment_id: i64,
    ) -> StoreResult<EmployeeRole> {
        let mut tx = self.pool.begin().await?;
        lock_employee(&mut *tx, employee_id).await?;

        sqlx::query(
            "UPDATE employee_roles SET is_primary = FALSE, updated_at = now() \
             WHERE employee_id = $1 AND is_primary AND id <> $2 AND deleted_at IS NULL",
        )
        .bind(employee_id)
        .bind(assignment_id)
        .execute(&mut *tx)
        .await?;

        let sql = format!(
            "UPDATE employee_roles SET is_primary = TRUE, updated_at = now() \
             WHERE id = $1 AND employee_id = $2 AND deleted_at IS NULL \
             RETURNING {EMPLOYEE_ROLE_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, EmployeeRole>(&sql)
            .bind(assignment_id)
            .bind(employee_id)
            .fetch_optional(&mut *tx)
            .await?;

        match updated {
            Some(row) => {
                tx.commit().await?;
                Ok(row)
            }
            None => {
                tx.rollback().await?;
                Err(StoreError::NotFound(format!(
                    "role assignment {assignment_id}"
                )))
            }
        }
    }

    async fn list_employee_roles(&self, employee_id: i64) -> StoreResult<Vec<EmployeeRole>> {
        let sql = format!(
            "SELECT {EMPLOYEE_ROLE_COLUMNS} FROM employee_roles \
             WHERE employee_id = $1 AND deleted_at IS NULL ORDER BY id"
        );
        Ok(sqlx::query_as::<_, EmployeeRole>(&sql)
            .bind(employee_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn remove_employee_role(&self, employee_id: i64, assignment_id: i64) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        lock_employee(&mut *tx, employee_id).await?;

        let current = sqlx::query_scalar::<_, bool>(
            "SELECT is_primary FROM employee_roles \
             WHERE id = $1 AND employee_id = $2 AND deleted_at IS NULL",
        )
        .bind(assignment_id)
        .bind(employee_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(was_primary) = current else {
            tx.rollback().await?;
            return Err(StoreError::NotFound(format!(
                "role assignment {assignment_id}"
            )));
        };

        sqlx::query(
            "UPDATE employee_roles \
             SET deleted_at = now(), is_primary = FALSE, updated_at = now() \
             WHERE id = $1",
        )
        .bind(assignment_id)
        .execute(&mut *tx)
        .await?;

        // Hand the primary flag to the oldest remaining assignment.
        if was_primary {
            sqlx::query(
                "UPDATE employee_roles SET is_primary = TRUE, updated_at = now() \
                 WHERE id = (SELECT id FROM employee_roles \
                             WHERE employee_id = $1 AND deleted_at IS NULL \
                             ORDER BY id LIMIT 1)",
            )
            .bind(employee_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    /// Connects to `QORE_TEST_DATABASE_URL` and applies migrations.
    async fn store() -> PgStore {
        let url = std::env::var("QORE_TEST_DATABASE_URL").expect("QORE_TEST_DATABASE_URL");
        let pool = PgPool::connect(&url).await.expect("connect");
        crate::migrate::migrate(&pool).await.expect("migrate");
        PgStore::new(pool)
    }

    async fn employee(store: &PgStore) -> Employee {
        let tag = uuid::Uuid::new_v4().simple().to_string();
        store
            .insert_employee(NewEmployee {
                employee_id: format!("T{}", &tag[..12]),
                first_name: "Pat".into(),
                last_name: "Test".into(),
                email: format!("{tag}@qore.test"),
                password_hash: "x".into(),
                phone: None,
                branch_id: None,
                department_id: None,
                designation_id: None,
                reporting_to: None,
                is_active: true,
                is_superadmin: false,
                created_by: None,
            })
            .await
            .unwrap()
    }

    async fn role(store: &PgStore) -> Role {
        let tag = uuid::Uuid::new_v4().simple().to_string();
        store
            .insert_role(NewRole {
                name: tag.clone(),
                slug: tag,
                description: None,
                is_system: false,
                is_active: true,
                created_by: None,
            })
            .await
            .unwrap()
    }

    async fn primary_ids(store: &PgStore, employee_id: i64) -> Vec<i64> {
        store
            .list_employee_roles(employee_id)
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.is_primary)
            .map(|r| r.id)
            .collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ignore = "requires QORE_TEST_DATABASE_URL"]
    async fn concurrent_first_assignments_yield_one_primary() {
        let store = Arc::new(store().await);
        let employee_id = employee(&store).await.id;

        let mut handles = Vec::new();
        for _ in 0..6 {
            let role = role(&store).await;
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .assign_role(NewEmployeeRole {
                        employee_id,
                        role_id: role.id,
                        is_primary: false,
                        assigned_by: None,
                    })
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(primary_ids(&store, employee_id).await.len(), 1);
    }

    #[tokio::test]
    #[ignore = "requires QORE_TEST_DATABASE_URL"]
    async fn removing_primary_promotes_oldest_remaining() {
        let store = store().await;
        let employee = employee(&store).await;
        let mut ids = Vec::new();
        for primary in [false, false, true] {
            let role = role(&store).await;
            let assignment = store
                .assign_role(NewEmployeeRole {
                    employee_id: employee.id,
                    role_id: role.id,
                    is_primary: primary,
                    assigned_by: None,
                })
                .await
                .unwrap();
            ids.push(assignment.id);
        }
        assert_eq!(primary_ids(&store, employee.id).await, [ids[2]]);

        store.remove_employee_role(employee.id, ids[2]).await.unwrap();
        assert_eq!(primary_ids(&store, employee.id).await, [ids[0]]);
    }
}
