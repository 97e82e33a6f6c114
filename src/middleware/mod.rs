pub mod auth;
pub mod response;

pub use auth::{admin_only, admin_or_provider, jwt_auth_middleware, students_only, AuthUser};
pub use response::{ApiResponse, ApiResult};
