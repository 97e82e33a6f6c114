//! Daily jobs against a real database. Both jobs scan the whole users table,
//! so the tests in this file run one at a time and only assert on the rows
//! they created.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use sqlx::PgPool;
use uuid::Uuid;

use lms_api::billing::{BillingError, BillingProvider, Price, Subscription};
use lms_api::database::models::User;
use lms_api::jobs::{purge_inactive_users, refresh_subscriptions};
use lms_api::middleware::AuthUser;
use lms_api::services::course_service::CreateCourseInput;
use lms_api::services::CourseService;
use lms_api::testing::{test_pool, StubBilling, TestContext};
use lms_api::types::Role;

static SERIAL: Lazy<tokio::sync::Mutex<()>> = Lazy::new(|| tokio::sync::Mutex::new(()));

const MONTHS: u32 = 3;

macro_rules! require_db {
    () => {
        match test_pool().await? {
            Some(pool) => TestContext::new(pool),
            None => {
                eprintln!("TEST_DATABASE_URL not set; skipping");
                return Ok(());
            }
        }
    };
}

async fn set_login_and_subscription(
    pool: &PgPool,
    user_id: Uuid,
    last_login: DateTime<Utc>,
    subscription_id: Option<&str>,
) -> Result<()> {
    sqlx::query("UPDATE users SET last_login_date = $2, subscription_id = $3 WHERE id = $1")
        .bind(user_id)
        .bind(last_login)
        .bind(subscription_id)
        .execute(pool)
        .await?;
    Ok(())
}

async fn user_exists(pool: &PgPool, user_id: Uuid) -> Result<bool> {
    Ok(sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
        .bind(user_id)
        .fetch_one(pool)
        .await?)
}

async fn access_end(pool: &PgPool, user_id: Uuid) -> Result<DateTime<Utc>> {
    Ok(sqlx::query_scalar("SELECT access_end_date FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?)
}

fn long_ago() -> DateTime<Utc> {
    Utc::now() - Duration::days(200)
}

fn sub_id() -> String {
    format!("sub_{}", Uuid::new_v4().simple())
}

#[tokio::test]
async fn cleanup_removes_inactive_non_admins_and_cancels_billing() -> Result<()> {
    let _serial = SERIAL.lock().await;
    let mut ctx = require_db!();

    let admin = ctx.create_user(Role::Admin).await?;
    let learner = ctx.create_user(Role::User).await?;
    let provider = ctx.create_user(Role::Provider).await?;
    let active = ctx.create_user(Role::User).await?;
    let learner_sub = sub_id();

    set_login_and_subscription(&ctx.pool, admin.id, long_ago(), None).await?;
    set_login_and_subscription(&ctx.pool, learner.id, long_ago(), Some(&learner_sub)).await?;
    set_login_and_subscription(&ctx.pool, provider.id, long_ago(), None).await?;

    let leaf = ctx.create_taxonomy().await?;
    let course = CourseService::new(ctx.pool.clone())
        .create(
            &AuthUser { id: provider.id, role: Role::Provider },
            CreateCourseInput {
                name: TestContext::unique("course"),
                overview: "Overview".to_string(),
                duration: "1h".to_string(),
                learning_points: vec![],
                sub_sub_group_id: leaf,
                resources: vec![],
                video_url: None,
            },
        )
        .await?;

    let report = purge_inactive_users(&ctx.pool, ctx.billing.as_ref(), MONTHS, Utc::now()).await?;
    assert!(report.succeeded >= 2);

    assert!(user_exists(&ctx.pool, admin.id).await?);
    assert!(user_exists(&ctx.pool, active.id).await?);
    assert!(!user_exists(&ctx.pool, learner.id).await?);
    assert!(!user_exists(&ctx.pool, provider.id).await?);
    assert!(ctx.billing.cancelled().contains(&learner_sub));

    let courses: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM courses WHERE id = $1")
        .bind(course.id)
        .fetch_one(&ctx.pool)
        .await?;
    assert_eq!(courses, 0);

    ctx.cleanup().await
}

#[tokio::test]
async fn cleanup_deletes_account_even_when_cancellation_fails() -> Result<()> {
    let _serial = SERIAL.lock().await;
    let mut ctx = require_db!();

    let first = ctx.create_user(Role::User).await?;
    let second = ctx.create_user(Role::User).await?;
    let (first_sub, second_sub) = (sub_id(), sub_id());
    set_login_and_subscription(&ctx.pool, first.id, long_ago() - Duration::days(1), Some(&first_sub)).await?;
    set_login_and_subscription(&ctx.pool, second.id, long_ago(), Some(&second_sub)).await?;
    ctx.billing.fail_for(&first_sub);

    purge_inactive_users(&ctx.pool, ctx.billing.as_ref(), MONTHS, Utc::now()).await?;

    assert!(!user_exists(&ctx.pool, first.id).await?);
    assert!(!user_exists(&ctx.pool, second.id).await?);
    let cancelled = ctx.billing.cancelled();
    assert!(!cancelled.contains(&first_sub));
    assert!(cancelled.contains(&second_sub));

    ctx.cleanup().await
}

/// Marks `revived` as freshly logged in whenever a subscription is
/// cancelled, as if the user signed in while the batch was running.
struct LoginDuringCleanup {
    pool: PgPool,
    revived: Uuid,
    inner: StubBilling,
}

#[async_trait]
impl BillingProvider for LoginDuringCleanup {
    async fn create_customer(&self, email: &str, name: &str) -> Result<String, BillingError> {
        self.inner.create_customer(email, name).await
    }

    async fn attach_payment_method(&self, customer_id: &str, payment_method_id: &str) -> Result<(), BillingError> {
        self.inner.attach_payment_method(customer_id, payment_method_id).await
    }

    async fn create_subscription(
        &self,
        customer_id: &str,
        price_id: &str,
        payment_method_id: Option<&str>,
    ) -> Result<Subscription, BillingError> {
        self.inner.create_subscription(customer_id, price_id, payment_method_id).await
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> Result<Subscription, BillingError> {
        sqlx::query("UPDATE users SET last_login_date = now() WHERE id = $1")
            .bind(self.revived)
            .execute(&self.pool)
            .await
            .map_err(|e| BillingError::Api { status: 500, message: e.to_string() })?;
        self.inner.cancel_subscription(subscription_id).await
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<Subscription, BillingError> {
        self.inner.retrieve_subscription(subscription_id).await
    }

    async fn list_prices(&self, product_id: &str) -> Result<Vec<Price>, BillingError> {
        self.inner.list_prices(product_id).await
    }
}

#[tokio::test]
async fn cleanup_skips_user_who_logs_in_mid_batch() -> Result<()> {
    let _serial = SERIAL.lock().await;
    let mut ctx = require_db!();

    let oldest = ctx.create_user(Role::User).await?;
    let revived = ctx.create_user(Role::User).await?;
    let oldest_sub = sub_id();
    // candidates are processed oldest login first
    set_login_and_subscription(&ctx.pool, oldest.id, long_ago() - Duration::days(30), Some(&oldest_sub)).await?;
    set_login_and_subscription(&ctx.pool, revived.id, long_ago(), None).await?;

    let billing = LoginDuringCleanup { pool: ctx.pool.clone(), revived: revived.id, inner: StubBilling::new() };
    let report = purge_inactive_users(&ctx.pool, &billing, MONTHS, Utc::now()).await?;

    assert!(report.skipped >= 1);
    assert!(!user_exists(&ctx.pool, oldest.id).await?);
    assert!(user_exists(&ctx.pool, revived.id).await?);
    assert!(billing.inner.cancelled().contains(&oldest_sub));

    ctx.cleanup().await
}

#[tokio::test]
async fn refresh_copies_period_end_and_counts_failures() -> Result<()> {
    let _serial = SERIAL.lock().await;
    let mut ctx = require_db!();

    let renewed: User = ctx.create_user(Role::User).await?;
    let broken: User = ctx.create_user(Role::User).await?;
    let (renewed_sub, broken_sub) = (sub_id(), sub_id());
    let expired = Utc::now() - Duration::days(1);
    for (user, sub) in [(&renewed, &renewed_sub), (&broken, &broken_sub)] {
        sqlx::query("UPDATE users SET subscription_id = $2, access_end_date = $3 WHERE id = $1")
            .bind(user.id)
            .bind(sub)
            .bind(expired)
            .execute(&ctx.pool)
            .await?;
    }
    ctx.billing.fail_for(&broken_sub);

    let report = refresh_subscriptions(&ctx.pool, ctx.billing.as_ref()).await?;
    assert!(report.failed >= 1);
    assert!(report.succeeded >= 1);

    // stub periods end 30 days out
    let renewed_end = access_end(&ctx.pool, renewed.id).await?;
    assert!(renewed_end > Utc::now() + Duration::days(29));
    let broken_end = access_end(&ctx.pool, broken.id).await?;
    assert!((broken_end - expired).num_seconds().abs() < 1);

    ctx.cleanup().await
}
