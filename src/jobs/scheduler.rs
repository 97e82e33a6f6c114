use chrono::{DateTime, Duration, NaiveTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::billing::BillingProvider;
use crate::config::JobsConfig;

/// The next instant strictly after `now` at `hour`:00 UTC.
pub fn next_run_after(now: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    let at = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

/// Sleep until the configured hour, run both jobs, repeat.
pub fn spawn_daily_jobs(pool: PgPool, billing: Arc<dyn BillingProvider>, config: JobsConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = Utc::now();
            let next = next_run_after(now, config.run_hour_utc);
            tracing::info!("Next maintenance run at {}", next);
            let wait = (next - now).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            match super::purge_inactive_users(&pool, billing.as_ref(), config.inactive_after_months, Utc::now()).await {
                Ok(report) => tracing::info!(?report, "Inactive user cleanup finished"),
                Err(e) => tracing::error!("Inactive user cleanup failed: {}", e),
            }
            match super::refresh_subscriptions(&pool, billing.as_ref()).await {
                Ok(report) => tracing::info!(?report, "Subscription refresh finished"),
                Err(e) => tracing::error!("Subscription refresh failed: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn runs_later_today_or_tomorrow() {
        let morning = Utc.with_ymd_and_hms(2024, 3, 10, 6, 30, 0).unwrap();
        assert_eq!(next_run_after(morning, 9), Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap());
        assert_eq!(next_run_after(morning, 0), Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap());
    }

    #[test]
    fn exact_hour_schedules_the_next_day() {
        let midnight = Utc.with_ymd_and_hms(2024, 12, 31, 0, 0, 0).unwrap();
        assert_eq!(next_run_after(midnight, 0), Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
    }
}
