//! Shared application state

use std::sync::Arc;

use specwright_billing::{
    BillingLookup, BillingProvider, DisabledBillingProvider, EntitlementResolver, PgSubscriberStore,
    PgUsageCounter, ProductTiers, StripeClient,
};
use sqlx::PgPool;

use crate::auth::SupabaseAuth;
use crate::config::Config;

/// Which billing backend entitlement checks consult
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingMode {
    Stripe,
    Disabled,
}

impl BillingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingMode::Stripe => "stripe",
            BillingMode::Disabled => "disabled",
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub resolver: Arc<EntitlementResolver>,
    pub auth: SupabaseAuth,
    pub billing_mode: BillingMode,
}

impl AppState {
    /// Wire the production resolver: Stripe (when enabled and configured) plus
    /// the Postgres mirror and usage counter.
    ///
    /// A missing or broken Stripe configuration does not stop the server; every
    /// caller then resolves to the free tier.
    pub fn from_config(config: Config, pool: PgPool) -> Self {
        let stripe = if config.enable_billing {
            match StripeClient::from_env() {
                Ok(client) => Some(client),
                Err(e) => {
                    tracing::warn!(error = %e, "Stripe not configured, all users resolve to the free tier");
                    None
                }
            }
        } else {
            tracing::info!("Billing disabled, all users resolve to the free tier");
            None
        };

        let (provider, products, billing_mode, timeout): (Arc<dyn BillingProvider>, _, _, _) = match stripe {
            Some(client) => {
                let products = client.config().product_tiers.clone();
                let timeout = client.config().request_timeout;
                if products.is_empty() {
                    tracing::warn!("No Stripe products mapped to tiers, subscribers will resolve to free");
                }
                (Arc::new(client), products, BillingMode::Stripe, timeout)
            }
            None => (
                Arc::new(DisabledBillingProvider),
                ProductTiers::new(),
                BillingMode::Disabled,
                specwright_billing::client::DEFAULT_REQUEST_TIMEOUT,
            ),
        };

        let lookup = BillingLookup::new(provider, Arc::new(PgSubscriberStore::new(pool.clone())), products)
            .with_timeout(timeout);
        let resolver = EntitlementResolver::new(lookup, Arc::new(PgUsageCounter::new(pool.clone())));
        let auth = SupabaseAuth::new(&config.supabase_url, &config.supabase_anon_key, config.auth_timeout);

        if !auth.is_configured() {
            tracing::warn!("Supabase auth not configured, every caller is anonymous");
        }

        Self::new(config, pool, Arc::new(resolver), auth, billing_mode)
    }

    pub fn new(
        config: Config,
        pool: PgPool,
        resolver: Arc<EntitlementResolver>,
        auth: SupabaseAuth,
        billing_mode: BillingMode,
    ) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            resolver,
            auth,
            billing_mode,
        }
    }

    /// State for the caller-resolution middleware
    pub fn auth_state(&self) -> SupabaseAuth {
        self.auth.clone()
    }
}
