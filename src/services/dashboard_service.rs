use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::{ApiError, AppResult};

const MONTHS: [&str; 12] = ["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"];

#[derive(Debug, Deserialize)]
pub struct MonthlyQuery {
    pub year: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct DailyQuery {
    pub month: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_users: i64,
    pub total_courses: i64,
    pub active_subscriptions: i64,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct MonthlyCount {
    pub month: &'static str,
    pub count: i64,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct DailyCount {
    pub day: String,
    pub date: u32,
    pub count: i64,
    pub percentage: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyRegistrations {
    pub month: String,
    pub daily_data: Vec<DailyCount>,
}

/// Months to report for `year`: all twelve for past years, up to the current
/// month for this year, none for future years.
pub fn months_to_report(year: i32, today: NaiveDate) -> u32 {
    use std::cmp::Ordering;
    match year.cmp(&today.year()) {
        Ordering::Less => 12,
        Ordering::Equal => today.month(),
        Ordering::Greater => 0,
    }
}

/// Parse labels like `"Jul, 2024"` into (year, month).
pub fn parse_month_label(label: &str) -> Option<(i32, u32)> {
    let (name, year) = label.split_once(',')?;
    let month = MONTHS.iter().position(|m| *m == name.trim())? as u32 + 1;
    let year: i32 = year.trim().parse().ok()?;
    Some((year, month))
}

/// `[first instant of the month, first instant of the next month)` in UTC.
pub fn month_bounds(year: i32, month: u32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single()?;
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let end = Utc.with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0).single()?;
    Some((start, end))
}

/// One entry per day of the month with its weekday label and its share of the
/// busiest day, rounded to a whole percent.
pub fn daily_breakdown(year: i32, month: u32, created: &[DateTime<Utc>]) -> Vec<DailyCount> {
    let Some((start, end)) = month_bounds(year, month) else {
        return vec![];
    };
    let days_in_month = (end - start).num_days() as u32;

    let mut counts = vec![0i64; days_in_month as usize];
    for at in created.iter().filter(|at| **at >= start && **at < end) {
        counts[at.day0() as usize] += 1;
    }
    let max = counts.iter().copied().max().unwrap_or(0).max(1);

    counts
        .into_iter()
        .enumerate()
        .filter_map(|(i, count)| {
            let date = NaiveDate::from_ymd_opt(year, month, i as u32 + 1)?;
            Some(DailyCount {
                day: date.format("%a").to_string(),
                date: i as u32 + 1,
                count,
                percentage: ((count as f64 / max as f64) * 100.0).round() as i64,
            })
        })
        .collect()
}

pub struct DashboardService {
    pool: PgPool,
}

impl DashboardService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn summary(&self) -> AppResult<DashboardSummary> {
        let (total_users, total_courses, active_subscriptions): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users),
                (SELECT COUNT(*) FROM courses),
                (SELECT COUNT(*) FROM users WHERE subscription_id IS NOT NULL AND access_end_date > now())
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(DashboardSummary {
            total_users,
            total_courses,
            active_subscriptions,
        })
    }

    pub async fn monthly_registrations(&self, year: Option<i32>) -> AppResult<Vec<MonthlyCount>> {
        let today = Utc::now().date_naive();
        let year = year.unwrap_or(today.year());
        let months = months_to_report(year, today);
        if months == 0 {
            return Ok(vec![]);
        }

        let (start, _) = month_bounds(year, 1).ok_or_else(|| ApiError::bad_request("Invalid year"))?;
        let (_, end) = month_bounds(year, months).ok_or_else(|| ApiError::bad_request("Invalid year"))?;
        let rows: Vec<(i32, i64)> = sqlx::query_as(
            r#"
            SELECT EXTRACT(MONTH FROM created_at AT TIME ZONE 'UTC')::int4 AS month, COUNT(*)
            FROM users
            WHERE created_at >= $1 AND created_at < $2
            GROUP BY 1
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(MONTHS
            .iter()
            .take(months as usize)
            .enumerate()
            .map(|(i, name)| MonthlyCount {
                month: *name,
                count: rows
                    .iter()
                    .find(|(m, _)| *m == i as i32 + 1)
                    .map(|(_, c)| *c)
                    .unwrap_or(0),
            })
            .collect())
    }

    pub async fn daily_registrations(&self, label: &str) -> AppResult<DailyRegistrations> {
        let (year, month) = parse_month_label(label).ok_or_else(|| {
            ApiError::bad_request("Invalid month or year format, expected e.g. 'Jul, 2024'")
        })?;
        let (start, end) = month_bounds(year, month).ok_or_else(|| ApiError::bad_request("Invalid month or year format"))?;

        let created: Vec<DateTime<Utc>> =
            sqlx::query_scalar("SELECT created_at FROM users WHERE created_at >= $1 AND created_at < $2")
                .bind(start)
                .bind(end)
                .fetch_all(&self.pool)
                .await?;

        Ok(DailyRegistrations {
            month: label.to_string(),
            daily_data: daily_breakdown(year, month, &created),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn months_reported_per_year() {
        let today = NaiveDate::from_ymd_opt(2024, 7, 15).unwrap();
        assert_eq!(months_to_report(2023, today), 12);
        assert_eq!(months_to_report(2024, today), 7);
        assert_eq!(months_to_report(2025, today), 0);
    }

    #[test]
    fn parses_month_labels() {
        assert_eq!(parse_month_label("Jul, 2024"), Some((2024, 7)));
        assert_eq!(parse_month_label("Dec,2023"), Some((2023, 12)));
        assert_eq!(parse_month_label("July, 2024"), None);
        assert_eq!(parse_month_label("Jul 2024"), None);
        assert_eq!(parse_month_label("Jul, twenty"), None);
    }

    #[test]
    fn december_bounds_roll_the_year() {
        let (start, end) = month_bounds(2023, 12).unwrap();
        assert_eq!(start.to_rfc3339(), "2023-12-01T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2024-01-01T00:00:00+00:00");
    }

    #[test]
    fn daily_breakdown_scales_to_busiest_day() {
        let at = |d: u32, h: u32| Utc.with_ymd_and_hms(2024, 2, d, h, 0, 0).unwrap();
        let created = vec![at(1, 9), at(1, 10), at(1, 11), at(2, 8), at(29, 23)];
        let days = daily_breakdown(2024, 2, &created);

        assert_eq!(days.len(), 29);
        assert_eq!(days[0], DailyCount { day: "Thu".into(), date: 1, count: 3, percentage: 100 });
        assert_eq!(days[1].percentage, 33);
        assert_eq!(days[28].count, 1);
        assert_eq!(days[2].percentage, 0);
    }

    #[test]
    fn empty_month_has_zero_percentages() {
        let days = daily_breakdown(2023, 4, &[]);
        assert_eq!(days.len(), 30);
        assert!(days.iter().all(|d| d.count == 0 && d.percentage == 0));
    }
}
