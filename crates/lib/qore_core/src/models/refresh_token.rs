//! Refresh-token ledger row.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One issued refresh credential.
///
/// Rows are never hard-deleted. Once `is_revoked` is set it is never cleared;
/// `replaced_by_token` links a rotated token to its successor.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RefreshToken {
    pub id: i64,
    #[serde(skip_serializing)]
    pub token: String,
    pub employee_id: i64,
    pub expires_at: DateTime<Utc>,
    pub is_revoked: bool,
    pub created_by_ip: Option<String>,
    pub revoked_by_ip: Option<String>,
    pub revoked_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub replaced_by_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RefreshToken {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Live means not revoked and not past expiry.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked && !self.is_expired_at(now)
    }
}

#[derive(Debug, Clone)]
pub struct NewRefreshToken {
    pub token: String,
    pub employee_id: i64,
    pub expires_at: DateTime<Utc>,
    pub created_by_ip: Option<String>,
}
