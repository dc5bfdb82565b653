//! Billing provider seam
//!
//! The lookup only needs two questions answered by the payment provider, so
//! they sit behind a trait. `StripeClient` is the production implementation;
//! `DisabledBillingProvider` is used when billing is switched off.

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::error::BillingResult;

/// An active subscription as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSubscription {
    pub id: String,
    /// Product of the first subscription item, if the provider reported one
    pub product_id: Option<String>,
    pub current_period_end: Option<OffsetDateTime>,
}

#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// Find the billing customer registered under a contact address
    async fn find_customer_by_email(&self, email: &str) -> BillingResult<Option<String>>;

    /// The customer's active subscription, if any
    async fn active_subscription(&self, customer_id: &str) -> BillingResult<Option<ProviderSubscription>>;
}

/// Reports no customers; every caller resolves to the free tier.
pub struct DisabledBillingProvider;

#[async_trait]
impl BillingProvider for DisabledBillingProvider {
    async fn find_customer_by_email(&self, _email: &str) -> BillingResult<Option<String>> {
        Ok(None)
    }

    async fn active_subscription(&self, _customer_id: &str) -> BillingResult<Option<ProviderSubscription>> {
        Ok(None)
    }
}
