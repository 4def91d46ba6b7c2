//! Employee: principal identity plus credential.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::SoftDeletable;

/// Employee row.
///
/// `password_hash` is never serialized; any JSON rendering of an employee is
/// safe to hand to a client.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Employee {
    pub id: i64,
    pub employee_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    #[sqlx(rename = "password")]
    pub password_hash: String,
    pub phone: Option<String>,
    pub branch_id: Option<i64>,
    pub department_id: Option<i64>,
    pub designation_id: Option<i64>,
    /// Manager, by employee row id.
    pub reporting_to: Option<i64>,
    pub is_active: bool,
    pub is_superadmin: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_by: Option<i64>,
    pub updated_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl SoftDeletable for Employee {
    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }
}

/// Insert payload. The password must already be hashed.
#[derive(Debug, Clone)]
pub struct NewEmployee {
    pub employee_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub branch_id: Option<i64>,
    pub department_id: Option<i64>,
    pub designation_id: Option<i64>,
    pub reporting_to: Option<i64>,
    pub is_active: bool,
    pub is_superadmin: bool,
    pub created_by: Option<i64>,
}
