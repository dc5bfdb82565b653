//! Entitlement Module
//!
//! Answers "what can this user do right now?" by merging the tier's limit set,
//! the reconciled billing record and the current usage counts into one
//! immutable snapshot.
//!
//! ## Design Principles
//!
//! 1. **Fail open to free**: no lookup failure ever reaches the caller; the
//!    snapshot degrades to the free-tier default instead
//! 2. **Snapshots, not state**: every check builds a fresh `EntitlementState`;
//!    callers wanting newer data check again
//! 3. **Pure predicates**: gating decisions are functions of the snapshot alone

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use specwright_shared::{
    AgentRole, Identity, Limit, LimitSet, Remaining, Tier, UsagePeriod, UsageSnapshot,
};
use thiserror::Error;
use time::OffsetDateTime;

use crate::lookup::BillingLookup;
use crate::subscriber::BillingRecord;
use crate::usage::UsageCounter;

/// A gated user action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    SendMessage,
    GenerateDocument,
    CreateProject,
    UseAgent(AgentRole),
    UseIntegrations,
}

/// Why an action was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntitlementDenied {
    #[error("Monthly message limit reached ({limit} on the {tier} plan)")]
    MessageQuota { tier: Tier, limit: u32 },

    #[error("Monthly document limit reached ({limit} on the {tier} plan)")]
    DocumentQuota { tier: Tier, limit: u32 },

    #[error("Project limit reached ({limit} on the {tier} plan)")]
    ProjectQuota { tier: Tier, limit: u32 },

    #[error("The {role} agent is not included in the {tier} plan")]
    AgentNotIncluded { tier: Tier, role: AgentRole },

    #[error("Jira and Linear integrations are not included in the {tier} plan")]
    IntegrationsNotIncluded { tier: Tier },
}

impl EntitlementDenied {
    /// Quota denials clear once usage resets or the plan grows;
    /// feature denials need an upgrade.
    pub fn is_quota(&self) -> bool {
        matches!(
            self,
            Self::MessageQuota { .. } | Self::DocumentQuota { .. } | Self::ProjectQuota { .. }
        )
    }
}

/// Per-user entitlement snapshot
///
/// Fields are read-only once built. Two snapshots compare equal when their
/// content matches; `computed_at` is ignored.
#[derive(Debug, Clone, Serialize)]
pub struct EntitlementState {
    tier: Tier,
    subscribed: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    subscription_end: Option<OffsetDateTime>,
    #[serde(flatten)]
    limits: LimitSet,
    #[serde(flatten)]
    usage: UsageSnapshot,
    #[serde(skip)]
    computed_at: OffsetDateTime,
}

impl PartialEq for EntitlementState {
    fn eq(&self, other: &Self) -> bool {
        self.tier == other.tier
            && self.subscribed == other.subscribed
            && self.subscription_end == other.subscription_end
            && self.limits == other.limits
            && self.usage == other.usage
    }
}

impl EntitlementState {
    /// Free tier, unsubscribed, nothing consumed
    pub fn free_default() -> Self {
        Self {
            tier: Tier::Free,
            subscribed: false,
            subscription_end: None,
            limits: LimitSet::for_tier(Tier::Free),
            usage: UsageSnapshot::default(),
            computed_at: OffsetDateTime::now_utc(),
        }
    }

    /// Merge a billing record and usage counts with the record's tier limits
    pub fn assemble(record: &BillingRecord, usage: UsageSnapshot) -> Self {
        Self {
            tier: record.tier,
            subscribed: record.subscribed,
            subscription_end: record.subscription_end,
            limits: LimitSet::for_tier(record.tier),
            usage,
            computed_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn subscribed(&self) -> bool {
        self.subscribed
    }

    pub fn subscription_end(&self) -> Option<OffsetDateTime> {
        self.subscription_end
    }

    pub fn limits(&self) -> &LimitSet {
        &self.limits
    }

    pub fn usage(&self) -> UsageSnapshot {
        self.usage
    }

    pub fn computed_at(&self) -> OffsetDateTime {
        self.computed_at
    }

    pub fn can_send_message(&self) -> bool {
        self.limits.chat_limit.allows(self.usage.chat_usage)
    }

    pub fn can_generate_document(&self) -> bool {
        self.usage.doc_usage < self.limits.doc_limit
    }

    pub fn can_create_project(&self) -> bool {
        self.limits.project_limit.allows(self.usage.project_count)
    }

    pub fn can_use_agent(&self, role: AgentRole) -> bool {
        self.limits.agents_allowed.contains(&role)
    }

    pub fn can_use_integrations(&self) -> bool {
        self.limits.integrations_allowed
    }

    pub fn remaining_messages(&self) -> Remaining {
        self.limits.chat_limit.remaining(self.usage.chat_usage)
    }

    pub fn remaining_documents(&self) -> Remaining {
        Limit::Bounded(self.limits.doc_limit).remaining(self.usage.doc_usage)
    }

    pub fn remaining_projects(&self) -> Remaining {
        self.limits.project_limit.remaining(self.usage.project_count)
    }

    pub fn permits(&self, action: Action) -> bool {
        self.gate(action).is_ok()
    }

    /// Check an attempted action against this snapshot
    pub fn gate(&self, action: Action) -> Result<(), EntitlementDenied> {
        let tier = self.tier;
        let allowed = match action {
            Action::SendMessage => self.can_send_message(),
            Action::GenerateDocument => self.can_generate_document(),
            Action::CreateProject => self.can_create_project(),
            Action::UseAgent(role) => self.can_use_agent(role),
            Action::UseIntegrations => self.can_use_integrations(),
        };

        if allowed {
            return Ok(());
        }

        Err(match action {
            Action::SendMessage => EntitlementDenied::MessageQuota {
                tier,
                limit: bounded_or_zero(self.limits.chat_limit),
            },
            Action::GenerateDocument => EntitlementDenied::DocumentQuota {
                tier,
                limit: self.limits.doc_limit,
            },
            Action::CreateProject => EntitlementDenied::ProjectQuota {
                tier,
                limit: bounded_or_zero(self.limits.project_limit),
            },
            Action::UseAgent(role) => EntitlementDenied::AgentNotIncluded { tier, role },
            Action::UseIntegrations => EntitlementDenied::IntegrationsNotIncluded { tier },
        })
    }
}

// Only reached for bounded limits: unlimited ones never deny
fn bounded_or_zero(limit: Limit) -> u32 {
    match limit {
        Limit::Bounded(n) => n,
        Limit::Unlimited => 0,
    }
}

/// Builds entitlement snapshots from billing and usage
pub struct EntitlementResolver {
    lookup: BillingLookup,
    usage: Arc<dyn UsageCounter>,
}

impl EntitlementResolver {
    pub fn new(lookup: BillingLookup, usage: Arc<dyn UsageCounter>) -> Self {
        Self { lookup, usage }
    }

    /// Compute a fresh snapshot for the caller.
    ///
    /// Anonymous callers get the free default without any I/O. Billing lookup
    /// and usage counting run concurrently; a usage failure yields the free
    /// default.
    pub async fn check(&self, identity: Option<&Identity>) -> EntitlementState {
        let Some(identity) = identity else {
            tracing::debug!("Anonymous entitlement check, using free tier");
            return EntitlementState::free_default();
        };

        let period = UsagePeriod::current();
        let (record, usage) = tokio::join!(
            self.lookup.lookup(identity),
            self.usage.snapshot(identity.user_id, &period),
        );

        let usage = match usage {
            Ok(usage) => usage,
            Err(e) => {
                tracing::warn!(
                    user_id = %identity.user_id,
                    error = %e,
                    "Usage count failed, falling back to free tier"
                );
                return EntitlementState::free_default();
            }
        };

        let state = EntitlementState::assemble(&record, usage);

        tracing::info!(
            user_id = %identity.user_id,
            tier = %state.tier,
            subscribed = state.subscribed,
            chat_usage = usage.chat_usage,
            doc_usage = usage.doc_usage,
            project_count = usage.project_count,
            "Entitlement check complete"
        );

        state
    }
}
