//! Static tier catalog: the single source of quota limits and feature
//! grants per tier. Pure lookups, no error paths — an unknown tier is
//! unrepresentable because [`Tier`] is a closed enum.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::entities::entitlement::{
    EntitlementStatus, QuotaState, TenantEntitlement, UNLIMITED,
};
use crate::domain::entities::feature::Feature;
use crate::domain::entities::tier::Tier;

/// Quota counter names. Every tier defines every counter; only limits vary.
pub mod quotas {
    pub const MONTHLY_ANALYSES: &str = "monthly_analyses";
    pub const TRACKED_KEYWORDS: &str = "tracked_keywords";
    pub const SITE_AUDITS: &str = "site_audits";
    pub const COMPETITOR_REPORTS: &str = "competitor_reports";

    pub const ALL: &[&str] = &[
        MONTHLY_ANALYSES,
        TRACKED_KEYWORDS,
        SITE_AUDITS,
        COMPETITOR_REPORTS,
    ];
}

/// Per-period quota limits for a tier. `-1` means unlimited.
pub fn limits_for(tier: Tier) -> BTreeMap<String, i64> {
    let table: [(&str, i64); 4] = match tier {
        Tier::Free => [
            (quotas::MONTHLY_ANALYSES, 10),
            (quotas::TRACKED_KEYWORDS, 25),
            (quotas::SITE_AUDITS, 1),
            (quotas::COMPETITOR_REPORTS, 0),
        ],
        Tier::Starter => [
            (quotas::MONTHLY_ANALYSES, 100),
            (quotas::TRACKED_KEYWORDS, 250),
            (quotas::SITE_AUDITS, 5),
            (quotas::COMPETITOR_REPORTS, 3),
        ],
        Tier::Agency => [
            (quotas::MONTHLY_ANALYSES, 1_000),
            (quotas::TRACKED_KEYWORDS, 2_500),
            (quotas::SITE_AUDITS, 25),
            (quotas::COMPETITOR_REPORTS, 25),
        ],
        Tier::Enterprise => [
            (quotas::MONTHLY_ANALYSES, UNLIMITED),
            (quotas::TRACKED_KEYWORDS, 25_000),
            (quotas::SITE_AUDITS, UNLIMITED),
            (quotas::COMPETITOR_REPORTS, UNLIMITED),
        ],
        Tier::Admin => [
            (quotas::MONTHLY_ANALYSES, UNLIMITED),
            (quotas::TRACKED_KEYWORDS, UNLIMITED),
            (quotas::SITE_AUDITS, UNLIMITED),
            (quotas::COMPETITOR_REPORTS, UNLIMITED),
        ],
    };
    table
        .into_iter()
        .map(|(name, limit)| (name.to_string(), limit))
        .collect()
}

/// Features a tier may use. Each tier's list is cumulative over the previous
/// one plus its explicit additions.
pub fn features_for(tier: Tier) -> &'static [Feature] {
    match tier {
        Tier::Free => &[],
        Tier::Starter => &[Feature::ApiAccess, Feature::ScheduledAudits],
        Tier::Agency => &[
            Feature::ApiAccess,
            Feature::ScheduledAudits,
            Feature::BulkExport,
            Feature::CompetitorTracking,
            Feature::WhiteLabelReports,
        ],
        Tier::Enterprise | Tier::Admin => &[
            Feature::ApiAccess,
            Feature::ScheduledAudits,
            Feature::BulkExport,
            Feature::CompetitorTracking,
            Feature::WhiteLabelReports,
            Feature::TeamSeats,
            Feature::PrioritySupport,
        ],
    }
}

/// The lazily-created default document for a tenant seen for the first time.
pub fn free_entitlement(tenant_id: Uuid, now: DateTime<Utc>) -> TenantEntitlement {
    TenantEntitlement {
        tenant_id,
        tier: Tier::Free,
        status: EntitlementStatus::Free,
        billing_ref: None,
        period_end: None,
        cancel_at_period_end: false,
        quotas: limits_for(Tier::Free)
            .into_iter()
            .map(|(name, limit)| (name, QuotaState::new(limit)))
            .collect(),
        last_payment_status: None,
        last_payment_at: None,
        last_event_seq: None,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_tier_defines_every_quota() {
        for tier in Tier::all() {
            let limits = limits_for(*tier);
            for name in quotas::ALL {
                assert!(limits.contains_key(*name), "{tier} missing {name}");
            }
            assert_eq!(limits.len(), quotas::ALL.len());
        }
    }

    #[test]
    fn test_limits_never_shrink_up_the_hierarchy() {
        for pair in Tier::all().windows(2) {
            let (lower, higher) = (pair[0], pair[1]);
            let lower_limits = limits_for(lower);
            let higher_limits = limits_for(higher);
            for name in quotas::ALL {
                let a = lower_limits[*name];
                let b = higher_limits[*name];
                // Unlimited dominates any finite cap.
                let not_worse = b == UNLIMITED || (a != UNLIMITED && b >= a);
                assert!(not_worse, "{higher} worse than {lower} for {name}");
            }
        }
    }

    #[test]
    fn test_features_accumulate_up_the_hierarchy() {
        for pair in Tier::all().windows(2) {
            let (lower, higher) = (pair[0], pair[1]);
            for feature in features_for(lower) {
                assert!(
                    features_for(higher).contains(feature),
                    "{higher} lost {feature} granted to {lower}"
                );
            }
        }
    }

    #[test]
    fn test_free_tier_has_no_gated_features() {
        assert!(features_for(Tier::Free).is_empty());
    }

    #[test]
    fn test_free_entitlement_defaults() {
        let tenant_id = Uuid::new_v4();
        let doc = free_entitlement(tenant_id, Utc::now());

        assert_eq!(doc.tenant_id, tenant_id);
        assert_eq!(doc.tier, Tier::Free);
        assert_eq!(doc.status, EntitlementStatus::Free);
        assert!(doc.billing_ref.is_none());
        assert!(doc.period_end.is_none());
        assert!(!doc.cancel_at_period_end);
        assert!(doc.quotas.values().all(|q| q.used == 0));
        assert_eq!(doc.quota(quotas::MONTHLY_ANALYSES).unwrap().limit, 10);
    }
}
