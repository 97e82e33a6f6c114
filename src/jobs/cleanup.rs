use chrono::{DateTime, Months, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::JobReport;
use crate::billing::BillingProvider;
use crate::error::{ApiError, AppResult};
use crate::services::cascade;

/// Remove non-admin accounts whose last login is older than `months`.
/// Each candidate is re-checked under a row lock, so an account that logs in
/// while the batch runs is left alone. Billing is cancelled before each
/// cascade; a failed cancellation is logged and the account is still removed.
pub async fn purge_inactive_users(
    pool: &PgPool,
    billing: &dyn BillingProvider,
    months: u32,
    now: DateTime<Utc>,
) -> AppResult<JobReport> {
    let cutoff = now
        .checked_sub_months(Months::new(months))
        .ok_or_else(|| ApiError::internal_server_error("Inactivity cutoff out of range"))?;

    let inactive: Vec<(Uuid, DateTime<Utc>)> = sqlx::query_as(
        "SELECT id, last_login_date FROM users WHERE role <> 'ADMIN' AND last_login_date < $1 ORDER BY last_login_date",
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await?;

    let mut report = JobReport::default();
    for (user_id, _) in inactive {
        match purge_if_still_inactive(pool, billing, user_id, cutoff).await {
            Ok(true) => report.record(true),
            Ok(false) => {
                tracing::info!(user_id = %user_id, "User became active during cleanup; skipped");
                report.skip();
            }
            Err(e) => {
                tracing::error!(user_id = %user_id, "Failed to delete inactive user: {}", e);
                report.record(false);
            }
        }
    }

    tracing::info!(
        cutoff = %cutoff,
        deleted = report.succeeded,
        failed = report.failed,
        "Inactive user cleanup"
    );
    Ok(report)
}

/// Lock the user row, confirm it is still an inactive non-admin, cancel
/// billing and run the cascade. Returns false when the user no longer
/// qualifies.
async fn purge_if_still_inactive(
    pool: &PgPool,
    billing: &dyn BillingProvider,
    user_id: Uuid,
    cutoff: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let candidate: Option<(Option<String>,)> = sqlx::query_as(
        "SELECT subscription_id FROM users WHERE id = $1 AND role <> 'ADMIN' AND last_login_date < $2 FOR UPDATE",
    )
    .bind(user_id)
    .bind(cutoff)
    .fetch_optional(&mut *tx)
    .await?;
    let Some((subscription_id,)) = candidate else {
        return Ok(false);
    };

    if let Some(subscription_id) = subscription_id.as_deref() {
        if let Err(e) = billing.cancel_subscription(subscription_id).await {
            tracing::warn!(user_id = %user_id, "Failed to cancel subscription {}: {}", subscription_id, e);
        }
    }

    cascade::purge_user(&mut tx, user_id).await?;
    tx.commit().await?;
    Ok(true)
}
