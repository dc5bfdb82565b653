//! Specwright Billing
//!
//! Resolves what a user is entitled to: billing lookup against Stripe, the
//! local subscriber mirror, usage counting and the entitlement resolver.

pub mod client;
pub mod entitlement;
pub mod error;
pub mod lookup;
pub mod provider;
pub mod refresh;
pub mod subscriber;
pub mod usage;

pub use client::{ProductTiers, StripeClient, StripeConfig};
pub use entitlement::{Action, EntitlementDenied, EntitlementResolver, EntitlementState};
pub use error::{BillingError, BillingResult};
pub use lookup::BillingLookup;
pub use provider::{BillingProvider, DisabledBillingProvider, ProviderSubscription};
pub use refresh::RefreshTask;
pub use subscriber::{BillingRecord, InMemorySubscriberStore, PgSubscriberStore, SubscriberStore};
pub use usage::{PgUsageCounter, UsageCounter};
