//! # qore_core
//!
//! Core domain logic for QORE: employees and their credentials, the
//! refresh-token ledger, roles, and the storage layer behind them.

pub mod auth;
pub mod migrate;
pub mod models;
pub mod org_chart;
pub mod store;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
