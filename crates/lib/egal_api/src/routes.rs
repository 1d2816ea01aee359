//! Route paths.

pub const GET_HEALTH: &str = "/health";

pub const POST_AUTH_LOGIN: &str = "/api/v1/auth/login";
pub const POST_AUTH_REFRESH: &str = "/api/v1/auth/refresh";
pub const POST_AUTH_LOGOUT: &str = "/api/v1/auth/logout";
pub const POST_AUTH_LOGOUT_ALL: &str = "/api/v1/auth/logout-all";
pub const POST_AUTH_FORGOT_PASSWORD: &str = "/api/v1/auth/forgot-password";
pub const POST_AUTH_RESET_PASSWORD: &str = "/api/v1/auth/reset-password";
pub const GET_AUTH_ME: &str = "/api/v1/auth/me";

pub const POST_ADMIN_USER_REVOKE_SESSIONS: &str = "/api/v1/admin/users/{id}/revoke-sessions";
