//! Stripe client configuration

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use specwright_shared::Tier;
use stripe::{Client, CustomerId, Expandable, ListCustomers, ListSubscriptions, SubscriptionStatusFilter};
use time::OffsetDateTime;

use crate::error::{BillingError, BillingResult};
use crate::provider::{BillingProvider, ProviderSubscription};

/// Default ceiling on a single billing-provider round trip
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for Stripe billing
#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// Stripe secret API key
    pub secret_key: String,
    /// Product IDs mapped to the tier they grant
    pub product_tiers: ProductTiers,
    /// Per-call timeout applied by the billing lookup
    pub request_timeout: Duration,
}

impl StripeConfig {
    /// Create config from environment variables
    ///
    /// `STRIPE_PRODUCT_PRO` and `STRIPE_PRODUCT_PREMIUM` accept comma-separated
    /// lists so monthly and annual products can share a tier.
    pub fn from_env() -> BillingResult<Self> {
        let secret_key = std::env::var("STRIPE_SECRET_KEY")
            .map_err(|_| BillingError::Config("STRIPE_SECRET_KEY not set".to_string()))?;
        if secret_key.trim().is_empty() {
            return Err(BillingError::Config("STRIPE_SECRET_KEY is empty".to_string()));
        }

        let mut product_tiers = ProductTiers::default();
        for (var, tier) in [("STRIPE_PRODUCT_PRO", Tier::Pro), ("STRIPE_PRODUCT_PREMIUM", Tier::Premium)] {
            if let Ok(ids) = std::env::var(var) {
                for id in ids.split(',').map(str::trim).filter(|id| !id.is_empty()) {
                    product_tiers.insert(id, tier);
                }
            }
        }

        let request_timeout = std::env::var("BILLING_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        Ok(Self {
            secret_key,
            product_tiers,
            request_timeout,
        })
    }
}

/// Static product-id → tier table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductTiers {
    tiers: HashMap<String, Tier>,
}

impl ProductTiers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, product_id: &str, tier: Tier) -> Self {
        self.insert(product_id, tier);
        self
    }

    pub fn insert(&mut self, product_id: &str, tier: Tier) {
        self.tiers.insert(product_id.to_string(), tier);
    }

    /// Tier granted by a product. Unknown or missing products grant `free`.
    pub fn tier_for_product(&self, product_id: Option<&str>) -> Tier {
        match product_id {
            Some(id) => match self.tiers.get(id) {
                Some(tier) => *tier,
                None => {
                    tracing::warn!(product_id = %id, "Unmapped Stripe product, treating as free tier");
                    Tier::Free
                }
            },
            None => {
                tracing::warn!("Subscription has no product, treating as free tier");
                Tier::Free
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }
}

/// Stripe billing client
#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    config: StripeConfig,
}

impl StripeClient {
    /// Create a new Stripe client from config
    pub fn new(config: StripeConfig) -> Self {
        let client = Client::new(&config.secret_key);
        Self { client, config }
    }

    /// Create a new Stripe client from environment variables
    pub fn from_env() -> BillingResult<Self> {
        let config = StripeConfig::from_env()?;
        Ok(Self::new(config))
    }

    /// Get the config
    pub fn config(&self) -> &StripeConfig {
        &self.config
    }
}

#[async_trait]
impl BillingProvider for StripeClient {
    async fn find_customer_by_email(&self, email: &str) -> BillingResult<Option<String>> {
        let mut params = ListCustomers::new();
        params.email = Some(email);
        params.limit = Some(1);

        let customers = stripe::Customer::list(&self.client, &params).await?;

        Ok(customers.data.into_iter().next().map(|c| c.id.to_string()))
    }

    async fn active_subscription(&self, customer_id: &str) -> BillingResult<Option<ProviderSubscription>> {
        let customer_id = customer_id
            .parse::<CustomerId>()
            .map_err(|e| BillingError::InvalidCustomerId(format!("{}: {}", customer_id, e)))?;

        let mut params = ListSubscriptions::new();
        params.customer = Some(customer_id);
        params.status = Some(SubscriptionStatusFilter::Active);
        params.limit = Some(1);

        let subscriptions = stripe::Subscription::list(&self.client, &params).await?;

        let Some(subscription) = subscriptions.data.into_iter().next() else {
            return Ok(None);
        };

        let product_id = subscription
            .items
            .data
            .first()
            .and_then(|item| item.price.as_ref())
            .and_then(|price| price.product.as_ref())
            .map(|product| match product {
                Expandable::Id(id) => id.to_string(),
                Expandable::Object(obj) => obj.id.to_string(),
            });

        Ok(Some(ProviderSubscription {
            id: subscription.id.to_string(),
            product_id,
            current_period_end: OffsetDateTime::from_unix_timestamp(subscription.current_period_end).ok(),
        }))
    }
}
