// handlers/health.rs - liveness check and the unmatched-route fallback

use axum::http::Uri;

use crate::error::ApiError;
use crate::middleware::ApiResponse;

/// GET /health
pub async fn health() -> ApiResponse<()> {
    ApiResponse::message("Server is running")
}

/// Any route nothing else matched
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::route_not_found(uri.path())
}
