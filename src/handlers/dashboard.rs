// handlers/dashboard.rs - /api/v1/dashboard handlers (admin only)

use axum::extract::State;

use crate::error::ApiError;
use crate::extract::ApiQuery;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::dashboard_service::{DailyQuery, DailyRegistrations, DashboardSummary, MonthlyCount, MonthlyQuery};
use crate::services::DashboardService;
use crate::state::AppState;

pub async fn summary(State(state): State<AppState>) -> ApiResult<DashboardSummary> {
    let summary = DashboardService::new(state.pool).summary().await?;
    Ok(ApiResponse::success("Dashboard summary retrieved successfully", summary))
}

/// GET /dashboard/registrations/monthly?year=2024
pub async fn monthly_registrations(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<MonthlyQuery>,
) -> ApiResult<Vec<MonthlyCount>> {
    let months = DashboardService::new(state.pool).monthly_registrations(query.year).await?;
    Ok(ApiResponse::success("Monthly registrations retrieved successfully", months))
}

/// GET /dashboard/registrations/daily?month=Jul, 2024
pub async fn daily_registrations(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<DailyQuery>,
) -> ApiResult<DailyRegistrations> {
    let label = query.month.ok_or_else(|| ApiError::bad_request("Month is required, e.g. 'Jul, 2024'"))?;
    let days = DashboardService::new(state.pool).daily_registrations(&label).await?;
    Ok(ApiResponse::success("Daily registrations retrieved successfully", days))
}
