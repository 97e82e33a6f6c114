// handlers/subscriptions.rs - /api/v1/subscriptions handlers

use axum::{extract::State, Extension};
use serde::Serialize;

use crate::billing::{Price, Subscription};
use crate::extract::{ApiQuery, ValidJson};
use crate::filter::PaginationQuery;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::subscription_service::{
    AttachPaymentInput, MySubscription, PriceQuery, SubscribeInput, SubscribeOutput, Subscriber,
};
use crate::services::SubscriptionService;
use crate::state::AppState;

fn service(state: &AppState) -> SubscriptionService {
    SubscriptionService::new(state.pool.clone(), state.billing.clone())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerOutput {
    customer_id: String,
}

#[derive(Serialize)]
pub struct StatusOutput {
    active: bool,
}

/// GET /subscriptions/price-ids?productId=
pub async fn price_ids(State(state): State<AppState>, ApiQuery(query): ApiQuery<PriceQuery>) -> ApiResult<Vec<Price>> {
    let prices = service(&state).prices(query.product_id.as_deref()).await?;
    Ok(ApiResponse::success("Price IDs retrieved successfully", prices))
}

/// POST /subscriptions/create-customer - Idempotent
pub async fn create_customer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<CustomerOutput> {
    let customer_id = service(&state).create_customer(auth.id).await?;
    Ok(ApiResponse::success("Customer created successfully", CustomerOutput { customer_id }))
}

pub async fn attach_payment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ValidJson(input): ValidJson<AttachPaymentInput>,
) -> ApiResult<()> {
    service(&state).attach_payment(auth.id, &input.payment_method_id).await?;
    Ok(ApiResponse::message("Payment method attached successfully"))
}

pub async fn subscribe(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ValidJson(input): ValidJson<SubscribeInput>,
) -> ApiResult<SubscribeOutput> {
    let output = service(&state).subscribe(auth.id, input).await?;
    Ok(ApiResponse::success("Subscription created successfully", output))
}

/// POST /subscriptions/cancel - Ends access immediately
pub async fn cancel(State(state): State<AppState>, Extension(auth): Extension<AuthUser>) -> ApiResult<Subscription> {
    let subscription = service(&state).cancel(auth.id).await?;
    Ok(ApiResponse::success("Subscription cancelled successfully", subscription))
}

pub async fn status(State(state): State<AppState>, Extension(auth): Extension<AuthUser>) -> ApiResult<StatusOutput> {
    let active = service(&state).status(auth.id).await?;
    Ok(ApiResponse::success("Subscription status retrieved successfully", StatusOutput { active }))
}

pub async fn my_details(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<MySubscription> {
    let details = service(&state).my_details(auth.id).await?;
    Ok(ApiResponse::success("Subscription details retrieved successfully", details))
}

/// GET /subscriptions/subscribers - Admin view with live provider status
pub async fn subscribers(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PaginationQuery>,
) -> ApiResult<Vec<Subscriber>> {
    let (rows, meta) = service(&state).subscribers(&query).await?;
    Ok(ApiResponse::paginated("Subscribers retrieved successfully", rows, meta))
}
