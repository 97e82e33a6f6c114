// handlers/users.rs - /api/v1/users handlers

use axum::{extract::State, Extension};
use uuid::Uuid;

use crate::database::models::{User, UserDetail};
use crate::extract::{ApiJson, ApiPath, ApiQuery, ValidJson};
use crate::filter::PaginationQuery;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::user_service::{
    AdminUpdateUserInput, ChangePasswordInput, LoginInput, LoginOutput, RegisterInput, UpdateProfileInput,
    UpdateRoleInput,
};
use crate::services::UserService;
use crate::state::AppState;

fn service(state: &AppState) -> UserService {
    UserService::new(state.pool.clone(), state.billing.clone())
}

/// POST /users/register - Public sign-up for learners and providers
pub async fn register(State(state): State<AppState>, ValidJson(input): ValidJson<RegisterInput>) -> ApiResult<User> {
    let user = service(&state).register(input).await?;
    Ok(ApiResponse::created("User registered successfully", user))
}

/// POST /users/login - Exchange credentials for a bearer token
pub async fn login(State(state): State<AppState>, ValidJson(input): ValidJson<LoginInput>) -> ApiResult<LoginOutput> {
    let output = service(&state).login(input).await?;
    Ok(ApiResponse::success("Login successful", output))
}

/// PATCH /users/change-password
pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ValidJson(input): ValidJson<ChangePasswordInput>,
) -> ApiResult<()> {
    service(&state).change_password(auth.id, input).await?;
    Ok(ApiResponse::message("Password changed successfully"))
}

/// GET /users/me
pub async fn me(State(state): State<AppState>, Extension(auth): Extension<AuthUser>) -> ApiResult<User> {
    let user = service(&state).get_user(auth.id).await?;
    Ok(ApiResponse::success("Profile retrieved successfully", user))
}

/// PATCH /users/me - Name and profile image only
pub async fn update_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ValidJson(input): ValidJson<UpdateProfileInput>,
) -> ApiResult<User> {
    let user = service(&state).update_profile(auth.id, input).await?;
    Ok(ApiResponse::success("Profile updated successfully", user))
}

/// GET /users - Admin listing with search and sorting
pub async fn list(State(state): State<AppState>, ApiQuery(query): ApiQuery<PaginationQuery>) -> ApiResult<Vec<User>> {
    let (users, meta) = service(&state).list(&query).await?;
    Ok(ApiResponse::paginated("Users retrieved successfully", users, meta))
}

/// GET /users/:id
pub async fn get(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<UserDetail> {
    let user = service(&state).detail(id).await?;
    Ok(ApiResponse::success("User retrieved successfully", user))
}

/// PATCH /users/:id
pub async fn update(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ValidJson(input): ValidJson<AdminUpdateUserInput>,
) -> ApiResult<User> {
    let user = service(&state).update(id, input).await?;
    Ok(ApiResponse::success("User updated successfully", user))
}

/// PATCH /users/:id/role
pub async fn update_role(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<UpdateRoleInput>,
) -> ApiResult<User> {
    let user = service(&state).update_role(id, input.role).await?;
    Ok(ApiResponse::success("User role updated successfully", user))
}

/// DELETE /users/:id - Cancels billing, then removes the user and all dependent rows
pub async fn delete(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<()> {
    service(&state).delete(id).await?;
    Ok(ApiResponse::message("User deleted successfully"))
}
