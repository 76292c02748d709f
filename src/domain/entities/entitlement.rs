use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::tier::Tier;

/// Billing status of a tenant's entitlement.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "entitlement_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum EntitlementStatus {
    #[default]
    Free,
    Active,
    PastDue,
    Canceled,
}

impl EntitlementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntitlementStatus::Free => "free",
            EntitlementStatus::Active => "active",
            EntitlementStatus::PastDue => "past_due",
            EntitlementStatus::Canceled => "canceled",
        }
    }

    /// Whether a paid subscription is attached (even if payment is late).
    pub fn has_subscription(&self) -> bool {
        matches!(self, EntitlementStatus::Active | EntitlementStatus::PastDue)
    }

    /// Payment is late but access has not been revoked yet.
    pub fn is_grace_period(&self) -> bool {
        matches!(self, EntitlementStatus::PastDue)
    }
}

impl std::fmt::Display for EntitlementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of the most recent payment event, kept for display and support
/// tooling only. Never consulted by access decisions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "payment_outcome", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    Succeeded,
    Failed,
}

impl PaymentOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentOutcome::Succeeded => "succeeded",
            PaymentOutcome::Failed => "failed",
        }
    }
}

/// A single bounded usage counter. `limit = -1` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaState {
    pub limit: i64,
    pub used: i64,
}

/// Sentinel limit value meaning "no cap".
pub const UNLIMITED: i64 = -1;

impl QuotaState {
    pub fn new(limit: i64) -> Self {
        Self { limit, used: 0 }
    }

    pub fn is_unlimited(&self) -> bool {
        self.limit == UNLIMITED
    }

    /// Units left before the cap; `UNLIMITED` when there is no cap.
    pub fn remaining(&self) -> i64 {
        if self.is_unlimited() {
            UNLIMITED
        } else {
            (self.limit - self.used).max(0)
        }
    }

    /// Whether consuming `amount` more units would cross the cap.
    pub fn would_exceed(&self, amount: i64) -> bool {
        !self.is_unlimited() && self.used + amount > self.limit
    }
}

/// The per-tenant entitlement document: the single record every feature gate
/// and quota check in the product reads, and the only record the
/// reconciliation engine writes.
///
/// Invariants:
/// - quota limits derive from `tier` via the tier catalog, never set directly
/// - `status = Free` implies `tier = Free` implies `billing_ref = None`
/// - `used` only grows within a billing period and resets to 0 at rollover
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantEntitlement {
    pub tenant_id: Uuid,
    pub tier: Tier,
    pub status: EntitlementStatus,
    pub billing_ref: Option<String>,
    pub period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub quotas: BTreeMap<String, QuotaState>,
    pub last_payment_status: Option<PaymentOutcome>,
    pub last_payment_at: Option<DateTime<Utc>>,
    /// Timestamp of the newest applied billing event, used to reject
    /// out-of-order subscription events.
    pub last_event_seq: Option<DateTime<Utc>>,
    /// Optimistic-concurrency token; every conditional write compares it.
    pub updated_at: DateTime<Utc>,
}

impl TenantEntitlement {
    pub fn quota(&self, name: &str) -> Option<&QuotaState> {
        self.quotas.get(name)
    }

    /// Replace quota limits with a new tier's table, carrying `used` over
    /// for counters that exist in both. Counters the new tier does not
    /// define are dropped.
    pub fn apply_limits(&mut self, limits: &BTreeMap<String, i64>) {
        let mut next = BTreeMap::new();
        for (name, limit) in limits {
            let used = self.quotas.get(name).map(|q| q.used).unwrap_or(0);
            next.insert(name.clone(), QuotaState { limit: *limit, used });
        }
        self.quotas = next;
    }

    /// Zero every usage counter. Runs exactly once per period rollover.
    pub fn reset_usage(&mut self) {
        for quota in self.quotas.values_mut() {
            quota.used = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_predicates() {
        assert!(EntitlementStatus::Active.has_subscription());
        assert!(EntitlementStatus::PastDue.has_subscription());
        assert!(!EntitlementStatus::Free.has_subscription());
        assert!(!EntitlementStatus::Canceled.has_subscription());

        assert!(EntitlementStatus::PastDue.is_grace_period());
        assert!(!EntitlementStatus::Active.is_grace_period());
    }

    #[test]
    fn test_quota_remaining() {
        let q = QuotaState { limit: 10, used: 7 };
        assert_eq!(q.remaining(), 3);
        assert!(!q.would_exceed(3));
        assert!(q.would_exceed(4));

        let exhausted = QuotaState { limit: 10, used: 10 };
        assert_eq!(exhausted.remaining(), 0);
        assert!(exhausted.would_exceed(1));
    }

    #[test]
    fn test_unlimited_quota_never_exceeds() {
        let q = QuotaState::new(UNLIMITED);
        assert!(q.is_unlimited());
        assert_eq!(q.remaining(), UNLIMITED);
        assert!(!q.would_exceed(1_000_000));
    }

    #[test]
    fn test_apply_limits_carries_usage_over() {
        let mut entitlement = TenantEntitlement {
            tenant_id: Uuid::new_v4(),
            tier: Tier::Starter,
            status: EntitlementStatus::Active,
            billing_ref: Some("sub_1".into()),
            period_end: None,
            cancel_at_period_end: false,
            quotas: BTreeMap::from([
                ("monthly_analyses".to_string(), QuotaState { limit: 100, used: 42 }),
                ("legacy_counter".to_string(), QuotaState { limit: 5, used: 5 }),
            ]),
            last_payment_status: None,
            last_payment_at: None,
            last_event_seq: None,
            updated_at: Utc::now(),
        };

        let limits = BTreeMap::from([
            ("monthly_analyses".to_string(), 1000),
            ("site_audits".to_string(), 25),
        ]);
        entitlement.apply_limits(&limits);

        assert_eq!(
            entitlement.quota("monthly_analyses"),
            Some(&QuotaState { limit: 1000, used: 42 })
        );
        assert_eq!(
            entitlement.quota("site_audits"),
            Some(&QuotaState { limit: 25, used: 0 })
        );
        assert!(entitlement.quota("legacy_counter").is_none());
    }

    #[test]
    fn test_reset_usage_zeroes_all_counters() {
        let mut entitlement = TenantEntitlement {
            tenant_id: Uuid::new_v4(),
            tier: Tier::Agency,
            status: EntitlementStatus::Active,
            billing_ref: Some("sub_2".into()),
            period_end: None,
            cancel_at_period_end: false,
            quotas: BTreeMap::from([
                ("a".to_string(), QuotaState { limit: 10, used: 3 }),
                ("b".to_string(), QuotaState { limit: UNLIMITED, used: 99 }),
            ]),
            last_payment_status: None,
            last_payment_at: None,
            last_event_seq: None,
            updated_at: Utc::now(),
        };

        entitlement.reset_usage();
        assert!(entitlement.quotas.values().all(|q| q.used == 0));
    }
}
