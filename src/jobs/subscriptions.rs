use sqlx::PgPool;

use super::JobReport;
use crate::billing::BillingProvider;
use crate::database::models::User;
use crate::error::AppResult;
use crate::services::subscription_service::sync_access_end;

/// Copy each subscriber's current period end from the provider onto their
/// access window.
pub async fn refresh_subscriptions(pool: &PgPool, billing: &dyn BillingProvider) -> AppResult<JobReport> {
    let subscribers =
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE subscription_id IS NOT NULL ORDER BY created_at")
            .fetch_all(pool)
            .await?;

    let mut report = JobReport::default();
    for user in &subscribers {
        let Some(subscription_id) = user.subscription_id.as_deref() else {
            continue;
        };
        let result = sync_access_end(pool, billing, user, subscription_id).await;
        if let Err(e) = &result {
            tracing::warn!(user_id = %user.id, "Failed to refresh subscription {}: {}", subscription_id, e);
        }
        report.record(result.is_ok());
    }

    tracing::info!(refreshed = report.succeeded, failed = report.failed, "Subscription refresh");
    Ok(report)
}
