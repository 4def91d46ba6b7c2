//! Roles and employee-role assignments.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::SoftDeletable;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    /// Built-in roles cannot be deleted or renamed.
    pub is_system: bool,
    pub is_active: bool,
    pub created_by: Option<i64>,
    pub updated_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl SoftDeletable for Role {
    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }
}

#[derive(Debug, Clone)]
pub struct NewRole {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub is_system: bool,
    pub is_active: bool,
    pub created_by: Option<i64>,
}

/// Partial update; `None` leaves a column unchanged.
#[derive(Debug, Clone, Default)]
pub struct RoleUpdate {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub updated_by: Option<i64>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EmployeeRole {
    pub id: i64,
    pub employee_id: i64,
    pub role_id: i64,
    pub is_primary: bool,
    pub assigned_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl SoftDeletable for EmployeeRole {
    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }
}

#[derive(Debug, Clone)]
pub struct NewEmployeeRole {
    pub employee_id: i64,
    pub role_id: i64,
    pub is_primary: bool,
    pub assigned_by: Option<i64>,
}
