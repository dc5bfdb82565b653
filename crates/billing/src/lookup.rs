//! Billing lookup
//!
//! Reconciles the payment provider's view of a caller against the local
//! mirror. Every failure path degrades to the free tier; nothing here returns
//! an error to the entitlement check.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use specwright_shared::{Identity, Tier};

use crate::client::{ProductTiers, DEFAULT_REQUEST_TIMEOUT};
use crate::error::{BillingError, BillingResult};
use crate::provider::BillingProvider;
use crate::subscriber::{BillingRecord, SubscriberStore};

pub struct BillingLookup {
    provider: Arc<dyn BillingProvider>,
    store: Arc<dyn SubscriberStore>,
    products: ProductTiers,
    timeout: Duration,
}

impl BillingLookup {
    pub fn new(
        provider: Arc<dyn BillingProvider>,
        store: Arc<dyn SubscriberStore>,
        products: ProductTiers,
    ) -> Self {
        Self {
            provider,
            store,
            products,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve the caller's billing record and refresh the mirror.
    ///
    /// Provider errors and timeouts yield the free record and leave the mirror
    /// untouched.
    pub async fn lookup(&self, identity: &Identity) -> BillingRecord {
        let record = match self.resolve(identity).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(
                    user_id = %identity.user_id,
                    error = %e,
                    "Billing lookup failed, falling back to free tier"
                );
                return BillingRecord::free(identity);
            }
        };

        if let Err(e) = self.store.upsert(&record).await {
            tracing::warn!(
                user_id = %identity.user_id,
                error = %e,
                "Failed to update billing mirror"
            );
        }

        tracing::debug!(
            user_id = %identity.user_id,
            tier = %record.tier,
            subscribed = record.subscribed,
            "Resolved billing record"
        );

        record
    }

    async fn resolve(&self, identity: &Identity) -> BillingResult<BillingRecord> {
        let customer_id = self
            .bounded(self.provider.find_customer_by_email(&identity.email))
            .await?;

        let Some(customer_id) = customer_id else {
            tracing::debug!(user_id = %identity.user_id, "No billing customer for caller");
            return Ok(BillingRecord::free(identity));
        };

        let subscription = self
            .bounded(self.provider.active_subscription(&customer_id))
            .await?;

        let record = match subscription {
            Some(subscription) => {
                let tier = self.products.tier_for_product(subscription.product_id.as_deref());
                let subscribed = tier != Tier::Free;
                BillingRecord {
                    user_id: identity.user_id,
                    email: identity.email.clone(),
                    tier,
                    subscribed,
                    subscription_end: subscription.current_period_end.filter(|_| subscribed),
                    stripe_customer_id: Some(customer_id),
                    stripe_subscription_id: Some(subscription.id),
                }
            }
            None => BillingRecord {
                stripe_customer_id: Some(customer_id),
                ..BillingRecord::free(identity)
            },
        };

        Ok(record)
    }

    async fn bounded<T>(&self, call: impl Future<Output = BillingResult<T>>) -> BillingResult<T> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| BillingError::Timeout(self.timeout.as_millis()))?
    }
}
