//! Local mirror of each user's billing state

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use specwright_shared::{Identity, Tier, UserId};
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::error::{BillingError, BillingResult};

/// A user's billing state, reconciled against the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingRecord {
    pub user_id: UserId,
    pub email: String,
    pub tier: Tier,
    pub subscribed: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub subscription_end: Option<OffsetDateTime>,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
}

impl BillingRecord {
    /// Unsubscribed, free-tier record for a caller
    pub fn free(identity: &Identity) -> Self {
        Self {
            user_id: identity.user_id,
            email: identity.email.clone(),
            tier: Tier::Free,
            subscribed: false,
            subscription_end: None,
            stripe_customer_id: None,
            stripe_subscription_id: None,
        }
    }
}

/// Storage for the billing mirror, keyed by user id
#[async_trait]
pub trait SubscriberStore: Send + Sync {
    /// Insert or overwrite the record for `record.user_id` (last write wins)
    async fn upsert(&self, record: &BillingRecord) -> BillingResult<()>;

    async fn get(&self, user_id: UserId) -> BillingResult<Option<BillingRecord>>;
}

/// Postgres-backed mirror (`subscribers` table)
#[derive(Clone)]
pub struct PgSubscriberStore {
    pool: PgPool,
}

impl PgSubscriberStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriberStore for PgSubscriberStore {
    async fn upsert(&self, record: &BillingRecord) -> BillingResult<()> {
        sqlx::query(
            r#"
            INSERT INTO subscribers (
                user_id, email, tier, subscribed, subscription_end,
                stripe_customer_id, stripe_subscription_id, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            ON CONFLICT (user_id) DO UPDATE SET
                email = EXCLUDED.email,
                tier = EXCLUDED.tier,
                subscribed = EXCLUDED.subscribed,
                subscription_end = EXCLUDED.subscription_end,
                stripe_customer_id = EXCLUDED.stripe_customer_id,
                stripe_subscription_id = EXCLUDED.stripe_subscription_id,
                updated_at = NOW()
            "#,
        )
        .bind(record.user_id)
        .bind(&record.email)
        .bind(record.tier)
        .bind(record.subscribed)
        .bind(record.subscription_end)
        .bind(&record.stripe_customer_id)
        .bind(&record.stripe_subscription_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, user_id: UserId) -> BillingResult<Option<BillingRecord>> {
        let row: Option<(String, String, bool, Option<OffsetDateTime>, Option<String>, Option<String>)> =
            sqlx::query_as(
                r#"
                SELECT email, tier, subscribed, subscription_end,
                       stripe_customer_id, stripe_subscription_id
                FROM subscribers
                WHERE user_id = $1
                "#,
            )
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(
            |(email, tier, subscribed, subscription_end, stripe_customer_id, stripe_subscription_id)| {
                BillingRecord {
                    user_id,
                    email,
                    // Rows written by older schema versions may carry retired tiers
                    tier: tier.parse().unwrap_or_default(),
                    subscribed,
                    subscription_end,
                    stripe_customer_id,
                    stripe_subscription_id,
                }
            },
        ))
    }
}

/// In-process mirror for tests and single-node development
#[derive(Default)]
pub struct InMemorySubscriberStore {
    records: RwLock<HashMap<UserId, BillingRecord>>,
}

impl InMemorySubscriberStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SubscriberStore for InMemorySubscriberStore {
    async fn upsert(&self, record: &BillingRecord) -> BillingResult<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| BillingError::Database("subscriber store lock poisoned".to_string()))?;
        records.insert(record.user_id, record.clone());
        Ok(())
    }

    async fn get(&self, user_id: UserId) -> BillingResult<Option<BillingRecord>> {
        let records = self
            .records
            .read()
            .map_err(|_| BillingError::Database("subscriber store lock poisoned".to_string()))?;
        Ok(records.get(&user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            user_id: UserId::new(),
            email: "ada@example.com".to_string(),
        }
    }

    #[tokio::test]
    async fn test_upsert_overwrites_previous_mirror() {
        let store = InMemorySubscriberStore::new();
        let identity = identity();

        store.upsert(&BillingRecord::free(&identity)).await.unwrap();

        let upgraded = BillingRecord {
            tier: Tier::Pro,
            subscribed: true,
            stripe_customer_id: Some("cus_123".to_string()),
            stripe_subscription_id: Some("sub_123".to_string()),
            ..BillingRecord::free(&identity)
        };
        store.upsert(&upgraded).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(identity.user_id).await.unwrap(), Some(upgraded));
    }

    #[tokio::test]
    async fn test_get_unknown_user() {
        let store = InMemorySubscriberStore::new();
        assert!(store.get(UserId::new()).await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_pg_upsert_roundtrip() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = PgPool::connect(&url).await.expect("connect");
        let store = PgSubscriberStore::new(pool);
        let identity = identity();

        let record = BillingRecord {
            tier: Tier::Premium,
            subscribed: true,
            ..BillingRecord::free(&identity)
        };
        store.upsert(&record).await.unwrap();
        store.upsert(&record).await.unwrap();

        let stored = store.get(identity.user_id).await.unwrap().unwrap();
        assert_eq!(stored.tier, Tier::Premium);
        assert!(stored.subscribed);
    }
}
