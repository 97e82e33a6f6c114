// handlers/enrollments.rs - /api/v1/enrollments handlers

use axum::{extract::State, Extension};
use uuid::Uuid;

use crate::database::models::{CertificateListItem, Enrollment, EnrollmentListItem};
use crate::extract::{ApiPath, ApiQuery};
use crate::filter::PaginationQuery;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::enrollment_service::{CompletionResult, EnrollmentCheck, EnrollmentFilter};
use crate::services::EnrollmentService;
use crate::state::AppState;

fn service(state: &AppState) -> EnrollmentService {
    EnrollmentService::new(state.pool.clone())
}

/// POST /enrollments/courses/:courseId/enroll
pub async fn enroll(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(course_id): ApiPath<Uuid>,
) -> ApiResult<Enrollment> {
    let enrollment = service(&state).enroll(auth.id, course_id).await?;
    Ok(ApiResponse::created("Enrolled in course successfully", enrollment))
}

/// PATCH /enrollments/courses/:courseId/complete - Completes and issues the certificate
pub async fn complete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(course_id): ApiPath<Uuid>,
) -> ApiResult<CompletionResult> {
    let result = service(&state).complete(auth.id, course_id).await?;
    Ok(ApiResponse::success("Course completed successfully", result))
}

pub async fn check(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(course_id): ApiPath<Uuid>,
) -> ApiResult<EnrollmentCheck> {
    let check = service(&state).check(auth.id, course_id).await?;
    Ok(ApiResponse::success("Enrollment status retrieved successfully", check))
}

/// GET /enrollments/my-enrollments?status=&groupId=&subGroupId=&subSubGroupId=
pub async fn my_enrollments(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<PaginationQuery>,
    ApiQuery(filter): ApiQuery<EnrollmentFilter>,
) -> ApiResult<Vec<EnrollmentListItem>> {
    let (rows, meta) = service(&state).my_enrollments(auth.id, &query, &filter).await?;
    Ok(ApiResponse::paginated("Enrollments retrieved successfully", rows, meta))
}

/// GET /enrollments/my-enrollments/by-group/:groupId
pub async fn my_enrollments_by_group(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(group_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<PaginationQuery>,
    ApiQuery(filter): ApiQuery<EnrollmentFilter>,
) -> ApiResult<Vec<EnrollmentListItem>> {
    let filter = EnrollmentFilter { group_id: Some(group_id), ..filter };
    let (rows, meta) = service(&state).my_enrollments(auth.id, &query, &filter).await?;
    Ok(ApiResponse::paginated("Enrollments retrieved successfully", rows, meta))
}

/// GET /enrollments/my-enrollments/by-subgroup/:subGroupId
pub async fn my_enrollments_by_sub_group(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(sub_group_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<PaginationQuery>,
    ApiQuery(filter): ApiQuery<EnrollmentFilter>,
) -> ApiResult<Vec<EnrollmentListItem>> {
    let filter = EnrollmentFilter { sub_group_id: Some(sub_group_id), ..filter };
    let (rows, meta) = service(&state).my_enrollments(auth.id, &query, &filter).await?;
    Ok(ApiResponse::paginated("Enrollments retrieved successfully", rows, meta))
}

/// GET /enrollments/my-enrollments/by-sub-subgroup/:subSubGroupId
pub async fn my_enrollments_by_sub_sub_group(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(sub_sub_group_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<PaginationQuery>,
    ApiQuery(filter): ApiQuery<EnrollmentFilter>,
) -> ApiResult<Vec<EnrollmentListItem>> {
    let filter = EnrollmentFilter { sub_sub_group_id: Some(sub_sub_group_id), ..filter };
    let (rows, meta) = service(&state).my_enrollments(auth.id, &query, &filter).await?;
    Ok(ApiResponse::paginated("Enrollments retrieved successfully", rows, meta))
}

/// GET /enrollments/my-certificates - Newest first
pub async fn my_certificates(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiQuery(filter): ApiQuery<EnrollmentFilter>,
) -> ApiResult<Vec<CertificateListItem>> {
    let certificates = service(&state).my_certificates(auth.id, &filter).await?;
    Ok(ApiResponse::success("Certificates retrieved successfully", certificates))
}

/// GET /enrollments/courses/:courseId/enrollments - Provider owner or admin
pub async fn course_enrollments(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(course_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<PaginationQuery>,
    ApiQuery(filter): ApiQuery<EnrollmentFilter>,
) -> ApiResult<Vec<EnrollmentListItem>> {
    let (rows, meta) = service(&state).course_enrollments(&auth, course_id, &query, &filter).await?;
    Ok(ApiResponse::paginated("Course enrollments retrieved successfully", rows, meta))
}
