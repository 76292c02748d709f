//! Access decisions: pure, side-effect-free functions every feature gate in
//! the product calls on every request. Nothing here reads a clock or a
//! store, and nothing here can trigger reconciliation.
//!
//! Tier is the single source of truth: cancellation already reset the tier
//! to free, and `past_due` keeps the paid tier during the grace period, so
//! no extra status checks are needed at the gate.

use crate::application::tier_catalog;
use crate::domain::entities::entitlement::TenantEntitlement;
use crate::domain::entities::feature::Feature;
use crate::domain::entities::tier::Tier;

pub fn can_access_feature(entitlement: &TenantEntitlement, feature: Feature) -> bool {
    tier_catalog::features_for(entitlement.tier).contains(&feature)
}

pub fn meets_tier(tier: Tier, required: Tier) -> bool {
    tier.meets(required)
}
