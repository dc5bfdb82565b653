//! Core domain types for Specwright entitlements

use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::{Duration, OffsetDateTime, UtcOffset};
use uuid::Uuid;

use crate::error::SpecwrightError;

// =============================================================================
// IDs
// =============================================================================

/// User identifier (the BaaS auth user id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for UserId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// An authenticated caller: the user id plus the contact address used to find
/// their billing customer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub email: String,
}

// =============================================================================
// Enums
// =============================================================================

/// Subscription tier for billing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Pro,
    Premium,
}

impl Default for Tier {
    fn default() -> Self {
        Self::Free
    }
}

impl Tier {
    /// Every tier, lowest first
    pub const ALL: [Tier; 3] = [Tier::Free, Tier::Pro, Tier::Premium];

    /// Limit set granted by this tier
    pub fn limits(&self) -> LimitSet {
        LimitSet::for_tier(*self)
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Free => write!(f, "free"),
            Self::Pro => write!(f, "pro"),
            Self::Premium => write!(f, "premium"),
        }
    }
}

impl std::str::FromStr for Tier {
    type Err = SpecwrightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "pro" => Ok(Self::Pro),
            "premium" => Ok(Self::Premium),
            _ => Err(SpecwrightError::Validation(format!("Invalid tier: {}", s))),
        }
    }
}

/// AI agent roles, one per product phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Ideation,
    Planning,
    Architecture,
    Backlog,
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ideation => write!(f, "ideation"),
            Self::Planning => write!(f, "planning"),
            Self::Architecture => write!(f, "architecture"),
            Self::Backlog => write!(f, "backlog"),
        }
    }
}

impl std::str::FromStr for AgentRole {
    type Err = SpecwrightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ideation" => Ok(Self::Ideation),
            "planning" => Ok(Self::Planning),
            "architecture" => Ok(Self::Architecture),
            "backlog" => Ok(Self::Backlog),
            _ => Err(SpecwrightError::Validation(format!("Unknown agent role: {}", s))),
        }
    }
}

// =============================================================================
// Limits
// =============================================================================

/// A quota that is either unbounded or capped at a fixed count.
///
/// Serialized as a plain number when bounded and as the string `"unlimited"`
/// otherwise. Deserialization also accepts the legacy `-1` sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    Unlimited,
    Bounded(u32),
}

impl Limit {
    /// Convert a legacy sentinel-encoded limit (any negative value means unlimited)
    pub fn from_sentinel(value: i64) -> Self {
        if value < 0 {
            Self::Unlimited
        } else {
            Self::Bounded(u32::try_from(value).unwrap_or(u32::MAX))
        }
    }

    pub fn is_unlimited(&self) -> bool {
        matches!(self, Self::Unlimited)
    }

    /// True while `usage` has not yet reached the cap
    pub fn allows(&self, usage: u32) -> bool {
        match self {
            Self::Unlimited => true,
            Self::Bounded(limit) => usage < *limit,
        }
    }

    /// Units left before the cap, never negative
    pub fn remaining(&self, usage: u32) -> Remaining {
        match self {
            Self::Unlimited => Remaining::Unlimited,
            Self::Bounded(limit) => Remaining::Count(limit.saturating_sub(usage)),
        }
    }
}

/// Units left under a [`Limit`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remaining {
    Unlimited,
    Count(u32),
}

const UNLIMITED: &str = "unlimited";

fn serialize_count<S: Serializer>(count: Option<u32>, serializer: S) -> Result<S::Ok, S::Error> {
    match count {
        Some(n) => serializer.serialize_u32(n),
        None => serializer.serialize_str(UNLIMITED),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CountRepr {
    Number(i64),
    Text(String),
}

fn deserialize_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    match CountRepr::deserialize(deserializer)? {
        CountRepr::Number(n) if n < 0 => Ok(None),
        CountRepr::Number(n) => u32::try_from(n)
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("count out of range: {}", n))),
        CountRepr::Text(s) if s.eq_ignore_ascii_case(UNLIMITED) => Ok(None),
        CountRepr::Text(s) => Err(serde::de::Error::custom(format!(
            "expected a count or \"unlimited\", got {:?}",
            s
        ))),
    }
}

impl Serialize for Limit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Unlimited => serialize_count(None, serializer),
            Self::Bounded(n) => serialize_count(Some(*n), serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Limit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(deserialize_count(deserializer)?.map_or(Self::Unlimited, Self::Bounded))
    }
}

impl Serialize for Remaining {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Unlimited => serialize_count(None, serializer),
            Self::Count(n) => serialize_count(Some(*n), serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Remaining {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(deserialize_count(deserializer)?.map_or(Self::Unlimited, Self::Count))
    }
}

/// Quotas and feature flags granted by a tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitSet {
    pub chat_limit: Limit,
    /// Document quota is always bounded
    pub doc_limit: u32,
    pub project_limit: Limit,
    pub agents_allowed: BTreeSet<AgentRole>,
    pub integrations_allowed: bool,
}

impl LimitSet {
    /// Static tier table
    /// Free (20 msgs / 2 docs / 1 project) → Pro (200 / 20 / 10) → Premium (unlimited / 100 / unlimited)
    pub fn for_tier(tier: Tier) -> Self {
        use AgentRole::*;

        match tier {
            Tier::Free => Self {
                chat_limit: Limit::Bounded(20),
                doc_limit: 2,
                project_limit: Limit::Bounded(1),
                agents_allowed: [Ideation, Planning].into_iter().collect(),
                integrations_allowed: false,
            },
            Tier::Pro => Self {
                chat_limit: Limit::Bounded(200),
                doc_limit: 20,
                project_limit: Limit::Bounded(10),
                agents_allowed: [Ideation, Planning, Architecture].into_iter().collect(),
                integrations_allowed: true,
            },
            Tier::Premium => Self {
                chat_limit: Limit::Unlimited,
                doc_limit: 100,
                project_limit: Limit::Unlimited,
                agents_allowed: [Ideation, Planning, Architecture, Backlog]
                    .into_iter()
                    .collect(),
                integrations_allowed: true,
            },
        }
    }
}

// =============================================================================
// Usage
// =============================================================================

/// Consumed quota units for the active period
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub chat_usage: u32,
    pub doc_usage: u32,
    /// Live total, not windowed by period
    pub project_count: u32,
}

/// Metering window: the UTC calendar month, half-open `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsagePeriod {
    #[serde(with = "time::serde::rfc3339")]
    pub start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end: OffsetDateTime,
}

impl UsagePeriod {
    /// The calendar month containing `now`
    pub fn containing(now: OffsetDateTime) -> Self {
        let today = now.to_offset(UtcOffset::UTC).date();
        let first = today - Duration::days(i64::from(today.day()) - 1);
        let days = time::util::days_in_year_month(first.year(), first.month());
        let start = first.midnight().assume_utc();

        Self {
            start,
            end: start + Duration::days(i64::from(days)),
        }
    }

    pub fn current() -> Self {
        Self::containing(OffsetDateTime::now_utc())
    }

    pub fn contains(&self, at: OffsetDateTime) -> bool {
        self.start <= at && at < self.end
    }
}
