//! Business logic behind the handlers.

pub mod auth;
pub mod employees;
pub mod roles;
