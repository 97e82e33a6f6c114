// handlers/courses.rs - /api/v1/courses handlers

use axum::{extract::State, Extension};
use uuid::Uuid;

use crate::database::models::{Course, CourseDetail, CourseListItem};
use crate::extract::{ApiPath, ApiQuery, ValidJson};
use crate::filter::PaginationQuery;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::course_service::{CourseFilter, CreateCourseInput, ResourceInput, UpdateCourseInput, VideoInput};
use crate::services::CourseService;
use crate::state::AppState;

fn service(state: &AppState) -> CourseService {
    CourseService::new(state.pool.clone())
}

/// POST /courses - The caller becomes the course provider
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ValidJson(input): ValidJson<CreateCourseInput>,
) -> ApiResult<CourseListItem> {
    let course = service(&state).create(&auth, input).await?;
    Ok(ApiResponse::created("Course created successfully", course))
}

/// GET /courses - Public catalog with taxonomy and provider filters
pub async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PaginationQuery>,
    ApiQuery(filter): ApiQuery<CourseFilter>,
) -> ApiResult<Vec<CourseListItem>> {
    let (courses, meta) = service(&state).list(&query, &filter).await?;
    Ok(ApiResponse::paginated("Courses retrieved successfully", courses, meta))
}

/// GET /courses/by-group/:groupId
pub async fn list_by_group(
    State(state): State<AppState>,
    ApiPath(group_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<PaginationQuery>,
    ApiQuery(filter): ApiQuery<CourseFilter>,
) -> ApiResult<Vec<CourseListItem>> {
    let filter = CourseFilter { group_id: Some(group_id), ..filter };
    let (courses, meta) = service(&state).list(&query, &filter).await?;
    Ok(ApiResponse::paginated("Courses retrieved successfully", courses, meta))
}

/// GET /courses/by-subgroup/:subGroupId
pub async fn list_by_sub_group(
    State(state): State<AppState>,
    ApiPath(sub_group_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<PaginationQuery>,
    ApiQuery(filter): ApiQuery<CourseFilter>,
) -> ApiResult<Vec<CourseListItem>> {
    let filter = CourseFilter { sub_group_id: Some(sub_group_id), ..filter };
    let (courses, meta) = service(&state).list(&query, &filter).await?;
    Ok(ApiResponse::paginated("Courses retrieved successfully", courses, meta))
}

/// GET /courses/:id - Course with reviews and quiz questions (answers withheld)
pub async fn get(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> ApiResult<CourseDetail> {
    let course = service(&state).detail(id).await?;
    Ok(ApiResponse::success("Course retrieved successfully", course))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ValidJson(input): ValidJson<UpdateCourseInput>,
) -> ApiResult<CourseListItem> {
    let course = service(&state).update(&auth, id, input).await?;
    Ok(ApiResponse::success("Course updated successfully", course))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<()> {
    service(&state).delete(&auth, id).await?;
    Ok(ApiResponse::message("Course deleted successfully"))
}

pub async fn set_video(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ValidJson(input): ValidJson<VideoInput>,
) -> ApiResult<Course> {
    let course = service(&state).set_video(&auth, id, input.video_url.trim()).await?;
    Ok(ApiResponse::success("Course video uploaded successfully", course))
}

pub async fn remove_video(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Course> {
    let course = service(&state).remove_video(&auth, id).await?;
    Ok(ApiResponse::success("Course video removed successfully", course))
}

pub async fn add_resource(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ValidJson(input): ValidJson<ResourceInput>,
) -> ApiResult<Course> {
    let course = service(&state).add_resource(&auth, id, input.resource_url.trim()).await?;
    Ok(ApiResponse::success("Course resource added successfully", course))
}

pub async fn remove_resource(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(id): ApiPath<Uuid>,
    ValidJson(input): ValidJson<ResourceInput>,
) -> ApiResult<Course> {
    let course = service(&state).remove_resource(&auth, id, input.resource_url.trim()).await?;
    Ok(ApiResponse::success("Course resource removed successfully", course))
}
