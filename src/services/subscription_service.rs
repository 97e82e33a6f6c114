use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::billing::{BillingProvider, CardSummary, Plan, Price, Subscription};
use crate::database::models::User;
use crate::database::Repository;
use crate::error::{ApiError, AppResult};
use crate::filter::{Condition, FilterData, FilterOrderInfo, PageMeta, PaginationQuery, SortDirection};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuery {
    pub product_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AttachPaymentInput {
    #[validate(length(min = 1, message = "Payment method ID is required"))]
    pub payment_method_id: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeInput {
    #[validate(length(min = 1, message = "Price ID is required"))]
    pub price_id: String,
    pub payment_method_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeOutput {
    pub subscription_id: String,
    pub client_secret: Option<String>,
    pub access_end_date: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionDetails {
    pub has_subscription: bool,
    pub status: String,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: DateTime<Utc>,
    pub cancel_at_period_end: bool,
    pub plan: Option<Plan>,
    pub payment_method: Option<CardSummary>,
}

impl SubscriptionDetails {
    fn none(access_end_date: DateTime<Utc>) -> Self {
        Self {
            has_subscription: false,
            status: "none".to_string(),
            current_period_start: None,
            current_period_end: access_end_date,
            cancel_at_period_end: false,
            plan: None,
            payment_method: None,
        }
    }
}

impl From<Subscription> for SubscriptionDetails {
    fn from(sub: Subscription) -> Self {
        Self {
            has_subscription: true,
            status: sub.status,
            current_period_start: sub.current_period_start,
            current_period_end: sub.current_period_end,
            cancel_at_period_end: sub.cancel_at_period_end,
            plan: sub.plan,
            payment_method: sub.payment_method,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionOwner {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub access_end_date: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct MySubscription {
    pub user: SubscriptionOwner,
    pub subscription: SubscriptionDetails,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscriber {
    #[serde(flatten)]
    pub user: User,
    pub subscription_status: String,
    pub subscription_end_date: DateTime<Utc>,
    pub is_active: bool,
}

impl Subscriber {
    /// Provider lookups that failed leave the status `unknown` and fall back
    /// to the stored access window.
    fn new(user: User, live: Option<Subscription>, now: DateTime<Utc>) -> Self {
        let (status, end) = match live {
            Some(sub) => (sub.status, sub.current_period_end),
            None => ("unknown".to_string(), user.access_end_date),
        };
        Self {
            is_active: status == "active" && now < end,
            subscription_status: status,
            subscription_end_date: end,
            user,
        }
    }
}

pub struct SubscriptionService {
    pool: PgPool,
    billing: Arc<dyn BillingProvider>,
}

impl SubscriptionService {
    pub fn new(pool: PgPool, billing: Arc<dyn BillingProvider>) -> Self {
        Self { pool, billing }
    }

    async fn user(&self, id: Uuid) -> AppResult<User> {
        Repository::<User>::new("users", self.pool.clone())
            .select_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))
    }

    pub async fn prices(&self, product_id: Option<&str>) -> AppResult<Vec<Price>> {
        let product_id = product_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::bad_request("Product ID is required"))?;
        Ok(self.billing.list_prices(product_id).await?)
    }

    /// Returns the stored customer id when there is one.
    pub async fn create_customer(&self, user_id: Uuid) -> AppResult<String> {
        let user = self.user(user_id).await?;
        if let Some(customer_id) = user.stripe_customer_id {
            return Ok(customer_id);
        }

        let customer_id = self.billing.create_customer(&user.email, &user.name).await?;
        sqlx::query("UPDATE users SET stripe_customer_id = $2, updated_at = now() WHERE id = $1")
            .bind(user_id)
            .bind(&customer_id)
            .execute(&self.pool)
            .await?;

        tracing::info!(user_id = %user_id, "Billing customer created");
        Ok(customer_id)
    }

    pub async fn attach_payment(&self, user_id: Uuid, payment_method_id: &str) -> AppResult<()> {
        let customer_id = self.customer_id(user_id).await?;
        self.billing.attach_payment_method(&customer_id, payment_method_id).await?;
        Ok(())
    }

    pub async fn subscribe(&self, user_id: Uuid, input: SubscribeInput) -> AppResult<SubscribeOutput> {
        let customer_id = self.customer_id(user_id).await?;
        let payment_method_id = input.payment_method_id.as_deref().filter(|s| !s.is_empty());

        if let Some(pm) = payment_method_id {
            self.billing.attach_payment_method(&customer_id, pm).await?;
        }
        let subscription = self
            .billing
            .create_subscription(&customer_id, &input.price_id, payment_method_id)
            .await?;

        sqlx::query("UPDATE users SET subscription_id = $2, access_end_date = $3, updated_at = now() WHERE id = $1")
            .bind(user_id)
            .bind(&subscription.id)
            .bind(subscription.current_period_end)
            .execute(&self.pool)
            .await?;

        tracing::info!(user_id = %user_id, subscription_id = %subscription.id, "Subscription created");
        Ok(SubscribeOutput {
            subscription_id: subscription.id,
            client_secret: subscription.client_secret,
            access_end_date: subscription.current_period_end,
        })
    }

    /// Cancels at the provider and ends access immediately.
    pub async fn cancel(&self, user_id: Uuid) -> AppResult<Subscription> {
        let user = self.user(user_id).await?;
        let subscription_id = user
            .subscription_id
            .ok_or_else(|| ApiError::bad_request("No active subscription found"))?;

        let cancelled = self.billing.cancel_subscription(&subscription_id).await?;
        sqlx::query("UPDATE users SET access_end_date = now(), subscription_id = NULL, updated_at = now() WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        tracing::info!(user_id = %user_id, subscription_id = %subscription_id, "Subscription cancelled");
        Ok(cancelled)
    }

    /// `false` without a subscription; otherwise syncs the access window and
    /// reports whether the provider considers it active.
    pub async fn status(&self, user_id: Uuid) -> AppResult<bool> {
        let user = self.user(user_id).await?;
        let Some(subscription_id) = user.subscription_id.as_deref() else {
            return Ok(false);
        };
        let subscription = sync_access_end(&self.pool, self.billing.as_ref(), &user, subscription_id).await?;
        Ok(subscription.is_active())
    }

    pub async fn my_details(&self, user_id: Uuid) -> AppResult<MySubscription> {
        let user = self.user(user_id).await?;

        let subscription = match user.subscription_id.as_deref() {
            Some(subscription_id) => self
                .billing
                .retrieve_subscription(subscription_id)
                .await
                .map_err(|e| {
                    tracing::error!(user_id = %user_id, "Error retrieving subscription details: {}", e);
                    ApiError::internal_server_error("Error retrieving subscription details")
                })?
                .into(),
            None => SubscriptionDetails::none(user.access_end_date),
        };

        Ok(MySubscription {
            user: SubscriptionOwner {
                id: user.id,
                name: user.name,
                email: user.email,
                access_end_date: user.access_end_date,
            },
            subscription,
        })
    }

    pub async fn subscribers(&self, query: &PaginationQuery) -> AppResult<(Vec<Subscriber>, PageMeta)> {
        let page = query.page_request();
        let mut conditions = vec![Condition::is_not_null("subscription_id")];
        if let Some(term) = query.search() {
            conditions.push(Condition::search(&["name", "email"], term));
        }

        let (users, total) = Repository::<User>::new("users", self.pool.clone())
            .select_page(FilterData {
                conditions,
                order: vec![FilterOrderInfo::new("created_at", SortDirection::Desc)],
                limit: Some(page.limit),
                offset: Some(page.offset()),
                ..Default::default()
            })
            .await?;

        let lookups = users.iter().map(|user| async move {
            let subscription_id = user.subscription_id.as_deref()?;
            match self.billing.retrieve_subscription(subscription_id).await {
                Ok(sub) => Some(sub),
                Err(e) => {
                    tracing::warn!(user_id = %user.id, "Error retrieving subscription: {}", e);
                    None
                }
            }
        });
        let live = futures::future::join_all(lookups).await;

        let now = Utc::now();
        let subscribers = users
            .into_iter()
            .zip(live)
            .map(|(user, sub)| Subscriber::new(user, sub, now))
            .collect();
        Ok((subscribers, PageMeta::new(page, total)))
    }

    async fn customer_id(&self, user_id: Uuid) -> AppResult<String> {
        self.user(user_id)
            .await?
            .stripe_customer_id
            .ok_or_else(|| ApiError::bad_request("No Stripe customer ID found"))
    }
}

/// Pull the subscription from the provider and store its period end as the
/// user's access end when it moved.
pub async fn sync_access_end(
    pool: &PgPool,
    billing: &dyn BillingProvider,
    user: &User,
    subscription_id: &str,
) -> AppResult<Subscription> {
    let subscription = billing.retrieve_subscription(subscription_id).await?;
    if subscription.current_period_end != user.access_end_date {
        sqlx::query("UPDATE users SET access_end_date = $2, updated_at = now() WHERE id = $1")
            .bind(user.id)
            .bind(subscription.current_period_end)
            .execute(pool)
            .await?;
    }
    Ok(subscription)
}
