use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::auth::{validate_jwt, Claims};
use crate::error::ApiError;
use crate::types::Role;

/// Authenticated user context extracted from JWT
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Admins act on anything; everyone else only on what they own.
    pub fn can_manage(&self, owner_id: Uuid) -> bool {
        self.is_admin() || self.id == owner_id
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.id,
            role: claims.role,
        }
    }
}

/// JWT authentication middleware that validates tokens and extracts user context
pub async fn jwt_auth_middleware(request: Request, next: Next) -> Result<Response, ApiError> {
    authorize(&[], request, next).await
}

pub async fn admin_only(request: Request, next: Next) -> Result<Response, ApiError> {
    authorize(&[Role::Admin], request, next).await
}

pub async fn admin_or_provider(request: Request, next: Next) -> Result<Response, ApiError> {
    authorize(&[Role::Admin, Role::Provider], request, next).await
}

pub async fn students_only(request: Request, next: Next) -> Result<Response, ApiError> {
    authorize(&[Role::User], request, next).await
}

/// Decode the bearer token, check the role list (empty means any role) and
/// inject `AuthUser` for the handler.
async fn authorize(roles: &[Role], mut request: Request, next: Next) -> Result<Response, ApiError> {
    let token = extract_jwt_from_headers(request.headers()).map_err(ApiError::unauthorized)?;

    let claims = validate_jwt(&token).map_err(|e| {
        tracing::debug!("Rejected token: {}", e);
        ApiError::unauthorized("You are not authorized")
    })?;

    if !roles.is_empty() && !roles.contains(&claims.role) {
        return Err(ApiError::forbidden("Forbidden"));
    }

    request.extensions_mut().insert(AuthUser::from(claims));
    Ok(next.run(request).await)
}

/// Extract JWT token from Authorization header. Accepts `Bearer <token>` and a bare token.
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| "You are not authorized".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    let token = auth_str.strip_prefix("Bearer ").unwrap_or(auth_str).trim();
    if token.is_empty() {
        return Err("Empty JWT token".to_string());
    }
    Ok(token.to_string())
}
