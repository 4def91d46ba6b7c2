//! Domain models.
//!
//! Rows map one-to-one onto the tables in `migrations/`. API-facing shapes
//! that need camelCase keys live in `qore_api::models`.

pub mod employee;
pub mod refresh_token;
pub mod role;

use chrono::{DateTime, Utc};

pub use employee::{Employee, NewEmployee};
pub use refresh_token::{NewRefreshToken, RefreshToken};
pub use role::{EmployeeRole, NewEmployeeRole, NewRole, Role, RoleUpdate};

/// Rows that are deleted by stamping `deleted_at` instead of being removed.
///
/// Stores filter these out of every lookup unless a method says otherwise.
pub trait SoftDeletable {
    fn deleted_at(&self) -> Option<DateTime<Utc>>;

    fn is_deleted(&self) -> bool {
        self.deleted_at().is_some()
    }
}
