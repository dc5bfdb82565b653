//! Usage counting
//!
//! Counts consumed quota units for a user. Messages and documents are windowed
//! to the usage period; projects are a live total.

use async_trait::async_trait;
use specwright_shared::{UsagePeriod, UsageSnapshot, UserId};
use sqlx::PgPool;

use crate::error::BillingResult;

#[async_trait]
pub trait UsageCounter: Send + Sync {
    /// Messages the user sent to agents during `period`
    async fn count_messages(&self, user_id: UserId, period: &UsagePeriod) -> BillingResult<u32>;

    /// Documents generated for the user during `period`
    async fn count_documents(&self, user_id: UserId, period: &UsagePeriod) -> BillingResult<u32>;

    /// Projects the user currently owns
    async fn count_projects(&self, user_id: UserId) -> BillingResult<u32>;

    /// All three counts, queried concurrently
    async fn snapshot(&self, user_id: UserId, period: &UsagePeriod) -> BillingResult<UsageSnapshot> {
        let (chat_usage, doc_usage, project_count) = tokio::try_join!(
            self.count_messages(user_id, period),
            self.count_documents(user_id, period),
            self.count_projects(user_id),
        )?;

        Ok(UsageSnapshot {
            chat_usage,
            doc_usage,
            project_count,
        })
    }
}

/// Postgres-backed usage counter
#[derive(Clone)]
pub struct PgUsageCounter {
    pool: PgPool,
}

impl PgUsageCounter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Missing rows count as zero
fn clamp_count(count: Option<i64>) -> u32 {
    u32::try_from(count.unwrap_or(0).max(0)).unwrap_or(u32::MAX)
}

#[async_trait]
impl UsageCounter for PgUsageCounter {
    async fn count_messages(&self, user_id: UserId, period: &UsagePeriod) -> BillingResult<u32> {
        let count: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)::BIGINT
            FROM chat_messages
            WHERE user_id = $1
              AND sender = 'user'
              AND created_at >= $2
              AND created_at < $3
            "#,
        )
        .bind(user_id)
        .bind(period.start)
        .bind(period.end)
        .fetch_optional(&self.pool)
        .await?;

        Ok(clamp_count(count))
    }

    async fn count_documents(&self, user_id: UserId, period: &UsagePeriod) -> BillingResult<u32> {
        let count: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)::BIGINT
            FROM generated_documents
            WHERE user_id = $1
              AND created_at >= $2
              AND created_at < $3
            "#,
        )
        .bind(user_id)
        .bind(period.start)
        .bind(period.end)
        .fetch_optional(&self.pool)
        .await?;

        Ok(clamp_count(count))
    }

    async fn count_projects(&self, user_id: UserId) -> BillingResult<u32> {
        let count: Option<i64> = sqlx::query_scalar(
            "SELECT COUNT(*)::BIGINT FROM projects WHERE user_id = $1 AND archived_at IS NULL",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(clamp_count(count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BillingError;

    struct Fixed {
        messages: u32,
        documents: u32,
        projects: u32,
        fail_documents: bool,
    }

    #[async_trait]
    impl UsageCounter for Fixed {
        async fn count_messages(&self, _user_id: UserId, _period: &UsagePeriod) -> BillingResult<u32> {
            Ok(self.messages)
        }

        async fn count_documents(&self, _user_id: UserId, _period: &UsagePeriod) -> BillingResult<u32> {
            if self.fail_documents {
                return Err(BillingError::Database("connection reset".to_string()));
            }
            Ok(self.documents)
        }

        async fn count_projects(&self, _user_id: UserId) -> BillingResult<u32> {
            Ok(self.projects)
        }
    }

    #[tokio::test]
    async fn test_snapshot_collects_all_counts() {
        let counter = Fixed {
            messages: 7,
            documents: 1,
            projects: 3,
            fail_documents: false,
        };

        let snapshot = counter.snapshot(UserId::new(), &UsagePeriod::current()).await.unwrap();

        assert_eq!(
            snapshot,
            UsageSnapshot {
                chat_usage: 7,
                doc_usage: 1,
                project_count: 3,
            }
        );
    }

    #[tokio::test]
    async fn test_snapshot_surfaces_query_failure() {
        let counter = Fixed {
            messages: 7,
            documents: 1,
            projects: 3,
            fail_documents: true,
        };

        assert!(counter.snapshot(UserId::new(), &UsagePeriod::current()).await.is_err());
    }

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_pg_counts_default_to_zero() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = PgPool::connect(&url).await.expect("connect");
        let counter = PgUsageCounter::new(pool);

        let snapshot = counter.snapshot(UserId::new(), &UsagePeriod::current()).await.unwrap();
        assert_eq!(snapshot, UsageSnapshot::default());
    }
}
