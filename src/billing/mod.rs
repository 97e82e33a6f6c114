//! Billing provider port. The HTTP layer and jobs only see `BillingProvider`;
//! `StripeClient` is the production implementation.

pub mod stripe;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

pub use stripe::StripeClient;

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Billing provider is not configured")]
    NotConfigured,

    #[error("Billing provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Billing provider response is missing {0}")]
    MissingField(&'static str),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Subscription state as reported by the provider
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub status: String,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: DateTime<Utc>,
    pub cancel_at_period_end: bool,
    #[serde(skip_serializing)]
    pub client_secret: Option<String>,
    pub plan: Option<Plan>,
    pub payment_method: Option<CardSummary>,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: String,
    pub nickname: Option<String>,
    pub amount: Option<Decimal>,
    pub currency: String,
    pub interval: Option<String>,
    pub product_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardSummary {
    pub id: String,
    pub brand: Option<String>,
    pub last4: Option<String>,
    pub expiry_month: Option<u32>,
    pub expiry_year: Option<u32>,
}

/// Price entry as exposed by `GET /subscriptions/price-ids`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Price {
    pub id: String,
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub currency: String,
    pub interval: Option<String>,
}

#[async_trait]
pub trait BillingProvider: Send + Sync {
    async fn create_customer(&self, email: &str, name: &str) -> Result<String, BillingError>;

    /// Attach the payment method and make it the customer's default.
    async fn attach_payment_method(&self, customer_id: &str, payment_method_id: &str) -> Result<(), BillingError>;

    async fn create_subscription(
        &self,
        customer_id: &str,
        price_id: &str,
        payment_method_id: Option<&str>,
    ) -> Result<Subscription, BillingError>;

    async fn cancel_subscription(&self, subscription_id: &str) -> Result<Subscription, BillingError>;

    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<Subscription, BillingError>;

    async fn list_prices(&self, product_id: &str) -> Result<Vec<Price>, BillingError>;
}

/// Provider timestamps are unix seconds
pub(crate) fn from_unix(seconds: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(seconds, 0).single()
}

/// Minor currency units (cents) to a decimal amount
pub(crate) fn from_minor_units(amount: i64) -> Decimal {
    Decimal::new(amount, 2)
}
