use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{from_minor_units, from_unix, BillingError, BillingProvider, CardSummary, Plan, Price, Subscription};
use crate::config::BillingConfig;

/// Stripe REST client (form-encoded requests, bearer secret key)
pub struct StripeClient {
    http: Client,
    api_base: String,
    secret_key: Option<String>,
}

impl StripeClient {
    pub fn new(config: &BillingConfig) -> Self {
        Self {
            http: Client::new(),
            api_base: config.stripe_api_base.trim_end_matches('/').to_string(),
            secret_key: config.stripe_secret_key.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BillingError> {
        let key = self.secret_key.as_deref().ok_or(BillingError::NotConfigured)?;
        let response = request.bearer_auth(key).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
            return Err(BillingError::Api { status: status.as_u16(), message });
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl BillingProvider for StripeClient {
    async fn create_customer(&self, email: &str, name: &str) -> Result<String, BillingError> {
        let request = self.http.post(self.url("customers")).form(&[("email", email), ("name", name)]);
        let customer: CustomerWire = self.send(request).await?;
        Ok(customer.id)
    }

    async fn attach_payment_method(&self, customer_id: &str, payment_method_id: &str) -> Result<(), BillingError> {
        let attach = self
            .http
            .post(self.url(&format!("payment_methods/{}/attach", payment_method_id)))
            .form(&[("customer", customer_id)]);
        let _: serde_json::Value = self.send(attach).await?;

        let set_default = self
            .http
            .post(self.url(&format!("customers/{}", customer_id)))
            .form(&[("invoice_settings[default_payment_method]", payment_method_id)]);
        let _: serde_json::Value = self.send(set_default).await?;
        Ok(())
    }

    async fn create_subscription(
        &self,
        customer_id: &str,
        price_id: &str,
        payment_method_id: Option<&str>,
    ) -> Result<Subscription, BillingError> {
        let mut form = vec![
            ("customer", customer_id),
            ("items[0][price]", price_id),
            ("expand[]", "latest_invoice.payment_intent"),
            ("expand[]", "default_payment_method"),
        ];
        if let Some(pm) = payment_method_id {
            form.push(("default_payment_method", pm));
        }
        let request = self.http.post(self.url("subscriptions")).form(&form);
        let wire: SubscriptionWire = self.send(request).await?;
        wire.into_subscription()
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> Result<Subscription, BillingError> {
        let request = self.http.delete(self.url(&format!("subscriptions/{}", subscription_id)));
        let wire: SubscriptionWire = self.send(request).await?;
        wire.into_subscription()
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<Subscription, BillingError> {
        let request = self
            .http
            .get(self.url(&format!("subscriptions/{}", subscription_id)))
            .query(&[("expand[]", "default_payment_method"), ("expand[]", "items.data.price.product")]);
        let wire: SubscriptionWire = self.send(request).await?;
        wire.into_subscription()
    }

    async fn list_prices(&self, product_id: &str) -> Result<Vec<Price>, BillingError> {
        let request = self.http.get(self.url("prices")).query(&[("product", product_id), ("limit", "100")]);
        let list: ListWire<PriceWire> = self.send(request).await?;
        Ok(list.data.into_iter().map(PriceWire::into_price).collect())
    }
}

// Wire format

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CustomerWire {
    id: String,
}

/// Expandable references arrive either as an id or as the full object
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Expandable<T> {
    Object(T),
    Id(String),
}

impl<T> Expandable<T> {
    fn object(self) -> Option<T> {
        match self {
            Expandable::Object(o) => Some(o),
            Expandable::Id(_) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListWire<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionWire {
    id: String,
    status: String,
    current_period_start: Option<i64>,
    current_period_end: Option<i64>,
    #[serde(default)]
    cancel_at_period_end: bool,
    latest_invoice: Option<Expandable<InvoiceWire>>,
    default_payment_method: Option<Expandable<PaymentMethodWire>>,
    items: Option<ListWire<SubscriptionItemWire>>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionItemWire {
    price: Option<PriceWire>,
    current_period_start: Option<i64>,
    current_period_end: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct InvoiceWire {
    payment_intent: Option<Expandable<PaymentIntentWire>>,
}

#[derive(Debug, Deserialize)]
struct PaymentIntentWire {
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaymentMethodWire {
    id: String,
    card: Option<CardWire>,
}

#[derive(Debug, Deserialize)]
struct CardWire {
    brand: Option<String>,
    last4: Option<String>,
    exp_month: Option<u32>,
    exp_year: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct PriceWire {
    id: String,
    nickname: Option<String>,
    unit_amount: Option<i64>,
    currency: String,
    recurring: Option<RecurringWire>,
    product: Option<Expandable<ProductWire>>,
}

#[derive(Debug, Deserialize)]
struct RecurringWire {
    interval: String,
}

#[derive(Debug, Deserialize)]
struct ProductWire {
    name: Option<String>,
}

impl PriceWire {
    fn into_price(self) -> Price {
        Price {
            id: self.id,
            name: self.nickname,
            price: self.unit_amount.map(from_minor_units),
            currency: self.currency,
            interval: self.recurring.map(|r| r.interval),
        }
    }

    fn into_plan(self) -> Plan {
        Plan {
            id: self.id,
            nickname: self.nickname,
            amount: self.unit_amount.map(from_minor_units),
            currency: self.currency,
            interval: self.recurring.map(|r| r.interval),
            product_name: self.product.and_then(Expandable::object).and_then(|p| p.name),
        }
    }
}

impl SubscriptionWire {
    /// Newer API versions report the billing period on the subscription item
    /// instead of the subscription.
    fn into_subscription(self) -> Result<Subscription, BillingError> {
        let first_item = self.items.and_then(|list| list.data.into_iter().next());
        let (item_start, item_end, price) = match first_item {
            Some(item) => (item.current_period_start, item.current_period_end, item.price),
            None => (None, None, None),
        };

        let period_end = self
            .current_period_end
            .or(item_end)
            .and_then(from_unix)
            .ok_or(BillingError::MissingField("current_period_end"))?;
        let period_start = self.current_period_start.or(item_start).and_then(from_unix);

        let client_secret = self
            .latest_invoice
            .and_then(Expandable::object)
            .and_then(|invoice| invoice.payment_intent)
            .and_then(Expandable::object)
            .and_then(|intent| intent.client_secret);

        let payment_method = self.default_payment_method.and_then(Expandable::object).map(|pm| {
            let card = pm.card;
            CardSummary {
                id: pm.id,
                brand: card.as_ref().and_then(|c| c.brand.clone()),
                last4: card.as_ref().and_then(|c| c.last4.clone()),
                expiry_month: card.as_ref().and_then(|c| c.exp_month),
                expiry_year: card.as_ref().and_then(|c| c.exp_year),
            }
        });

        Ok(Subscription {
            id: self.id,
            status: self.status,
            current_period_start: period_start,
            current_period_end: period_end,
            cancel_at_period_end: self.cancel_at_period_end,
            client_secret,
            plan: price.map(PriceWire::into_plan),
            payment_method,
        })
    }
}
