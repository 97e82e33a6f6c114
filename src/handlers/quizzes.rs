// handlers/quizzes.rs - /api/v1/quizzes handlers

use axum::{extract::State, Extension};
use uuid::Uuid;

use crate::database::models::QuizView;
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::quiz_service::{CreateQuizInput, QuizResult, SubmitQuizInput};
use crate::services::QuizService;
use crate::state::AppState;

fn service(state: &AppState) -> QuizService {
    QuizService::new(state.pool.clone())
}

/// POST /quizzes/courses/:courseId/quiz
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(course_id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<CreateQuizInput>,
) -> ApiResult<QuizView> {
    let quiz = service(&state).create(&auth, course_id, input).await?;
    Ok(ApiResponse::created("Quiz created successfully", quiz))
}

/// GET /quizzes/courses/:courseId/quiz - Answers only for admins and the course provider
pub async fn get_for_course(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(course_id): ApiPath<Uuid>,
) -> ApiResult<QuizView> {
    let quiz = service(&state).get_for_course(&auth, course_id).await?;
    Ok(ApiResponse::success("Quiz retrieved successfully", quiz))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(quiz_id): ApiPath<Uuid>,
) -> ApiResult<()> {
    service(&state).delete(&auth, quiz_id).await?;
    Ok(ApiResponse::message("Quiz deleted successfully"))
}

/// POST /quizzes/:quizId/submit - One attempt per learner
pub async fn submit(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(quiz_id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<SubmitQuizInput>,
) -> ApiResult<QuizResult> {
    let result = service(&state).submit(auth.id, quiz_id, input).await?;
    Ok(ApiResponse::success("Quiz submitted successfully", result))
}

pub async fn my_attempt(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(quiz_id): ApiPath<Uuid>,
) -> ApiResult<QuizResult> {
    let result = service(&state).my_attempt(auth.id, quiz_id).await?;
    Ok(ApiResponse::success("Quiz attempt retrieved successfully", result))
}
