//! Scheduled entitlement refresh
//!
//! A caller that wants its snapshot kept current (e.g. a long-lived session)
//! owns a `RefreshTask`. The task re-checks on a fixed interval and publishes
//! each fresh snapshot over a watch channel. Dropping the task stops it.

use std::sync::Arc;
use std::time::Duration;

use specwright_shared::Identity;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::entitlement::{EntitlementResolver, EntitlementState};

/// Shortest allowed refresh period; `tokio::time::interval` rejects zero
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

pub struct RefreshTask {
    cancel: CancellationToken,
    snapshots: watch::Receiver<Arc<EntitlementState>>,
    handle: JoinHandle<()>,
}

impl RefreshTask {
    /// Run an initial check, then keep re-checking every `every`
    ///
    /// Periods shorter than [`MIN_REFRESH_INTERVAL`] are raised to it.
    pub async fn start(
        resolver: Arc<EntitlementResolver>,
        identity: Option<Identity>,
        every: Duration,
    ) -> Self {
        if every < MIN_REFRESH_INTERVAL {
            tracing::warn!(
                requested = ?every,
                "Refresh interval too short, using the minimum"
            );
        }
        let every = every.max(MIN_REFRESH_INTERVAL);

        let initial = resolver.check(identity.as_ref()).await;
        let (tx, snapshots) = watch::channel(Arc::new(initial));
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately and the initial check already ran
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {}
                }

                let state = tokio::select! {
                    _ = token.cancelled() => break,
                    state = resolver.check(identity.as_ref()) => state,
                };

                // Each snapshot replaces the previous one outright
                if tx.send(Arc::new(state)).is_err() {
                    break;
                }
            }

            tracing::debug!("Entitlement refresh stopped");
        });

        Self {
            cancel,
            snapshots,
            handle,
        }
    }

    /// Most recent snapshot
    pub fn latest(&self) -> Arc<EntitlementState> {
        self.snapshots.borrow().clone()
    }

    /// A receiver that is notified whenever a new snapshot lands
    pub fn subscribe(&self) -> watch::Receiver<Arc<EntitlementState>> {
        self.snapshots.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for RefreshTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ProductTiers;
    use crate::error::BillingResult;
    use crate::lookup::BillingLookup;
    use crate::provider::DisabledBillingProvider;
    use crate::subscriber::InMemorySubscriberStore;
    use crate::usage::UsageCounter;
    use async_trait::async_trait;
    use specwright_shared::{UsagePeriod, UserId};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Each check sees one more message than the last
    #[derive(Default)]
    struct Growing(AtomicU32);

    #[async_trait]
    impl UsageCounter for Growing {
        async fn count_messages(&self, _user_id: UserId, _period: &UsagePeriod) -> BillingResult<u32> {
            Ok(self.0.fetch_add(1, Ordering::SeqCst))
        }

        async fn count_documents(&self, _user_id: UserId, _period: &UsagePeriod) -> BillingResult<u32> {
            Ok(0)
        }

        async fn count_projects(&self, _user_id: UserId) -> BillingResult<u32> {
            Ok(0)
        }
    }

    fn resolver() -> Arc<EntitlementResolver> {
        let lookup = BillingLookup::new(
            Arc::new(DisabledBillingProvider),
            Arc::new(InMemorySubscriberStore::new()),
            ProductTiers::new(),
        );
        Arc::new(EntitlementResolver::new(lookup, Arc::new(Growing::default())))
    }

    fn identity() -> Option<Identity> {
        Some(Identity {
            user_id: UserId::new(),
            email: "ken@example.com".to_string(),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_publishes_fresh_snapshots() {
        let task = RefreshTask::start(resolver(), identity(), Duration::from_secs(60)).await;
        assert_eq!(task.latest().usage().chat_usage, 0);

        let mut rx = task.subscribe();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().usage().chat_usage, 1);

        rx.changed().await.unwrap();
        assert_eq!(task.latest().usage().chat_usage, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_the_loop() {
        let task = RefreshTask::start(resolver(), identity(), Duration::from_secs(60)).await;
        let mut rx = task.subscribe();

        task.cancel();
        // Sender is dropped once the loop exits
        assert!(rx.changed().await.is_err());
        while !task.is_finished() {
            tokio::task::yield_now().await;
        }
        assert_eq!(task.latest().usage().chat_usage, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_keeps_refreshing() {
        let task = RefreshTask::start(resolver(), identity(), Duration::ZERO).await;
        let mut rx = task.subscribe();

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().usage().chat_usage, 1);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().usage().chat_usage, 2);
        assert!(!task.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let task = RefreshTask::start(resolver(), identity(), Duration::from_secs(60)).await;
        let mut rx = task.subscribe();

        drop(task);

        assert!(rx.changed().await.is_err());
    }
}
