// handlers/reviews.rs - /api/v1/reviews handlers

use axum::{extract::State, Extension};
use uuid::Uuid;

use crate::database::models::{Review, ReviewFeedItem};
use crate::extract::{ApiPath, ApiQuery, ValidJson};
use crate::filter::PaginationQuery;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::review_service::ReviewInput;
use crate::services::ReviewService;
use crate::state::AppState;

fn service(state: &AppState) -> ReviewService {
    ReviewService::new(state.pool.clone())
}

/// POST /reviews/courses/:courseId - Create or replace the caller's review
pub async fn upsert(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(course_id): ApiPath<Uuid>,
    ValidJson(input): ValidJson<ReviewInput>,
) -> ApiResult<Review> {
    let review = service(&state).upsert(auth.id, course_id, input).await?;
    Ok(ApiResponse::success("Review submitted successfully", review))
}

pub async fn course_reviews(
    State(state): State<AppState>,
    ApiPath(course_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<PaginationQuery>,
) -> ApiResult<Vec<ReviewFeedItem>> {
    let (reviews, meta) = service(&state).course_reviews(course_id, &query).await?;
    Ok(ApiResponse::paginated("Reviews retrieved successfully", reviews, meta))
}

pub async fn my_reviews(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<PaginationQuery>,
) -> ApiResult<Vec<ReviewFeedItem>> {
    let (reviews, meta) = service(&state).my_reviews(auth.id, &query).await?;
    Ok(ApiResponse::paginated("Reviews retrieved successfully", reviews, meta))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(review_id): ApiPath<Uuid>,
) -> ApiResult<()> {
    service(&state).delete(&auth, review_id).await?;
    Ok(ApiResponse::message("Review deleted successfully"))
}
