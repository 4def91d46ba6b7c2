//! Route paths.

pub const GET_HEALTH: &str = "/health";

pub const POST_AUTH_LOGIN: &str = "/api/employee-auth/login";
pub const POST_AUTH_REFRESH: &str = "/api/employee-auth/refresh-token";
pub const POST_AUTH_LOGOUT: &str = "/api/employee-auth/logout";
pub const POST_AUTH_LOGOUT_ALL: &str = "/api/employee-auth/logout-all";
pub const GET_AUTH_STATUS: &str = "/api/employee-auth/status";
pub const POST_AUTH_CHANGE_PASSWORD: &str = "/api/employee-auth/change-password";

pub const EMPLOYEES: &str = "/api/employees";
pub const EMPLOYEES_ID: &str = "/api/employees/{id}";
pub const EMPLOYEES_ID_REPORTS: &str = "/api/employees/{id}/reports";
pub const EMPLOYEES_ID_CHAIN: &str = "/api/employees/{id}/chain";
pub const EMPLOYEES_ID_ROLES: &str = "/api/employees/{id}/roles";
pub const EMPLOYEES_ID_ROLES_ASSIGNMENT: &str = "/api/employees/{id}/roles/{assignment_id}";
pub const EMPLOYEES_ID_ROLES_ASSIGNMENT_PRIMARY: &str =
    "/api/employees/{id}/roles/{assignment_id}/primary";

pub const ROLES: &str = "/api/roles";
pub const ROLES_ID: &str = "/api/roles/{id}";
