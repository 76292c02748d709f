use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Product features gated by tier.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Feature {
    ApiAccess,
    ScheduledAudits,
    BulkExport,
    CompetitorTracking,
    WhiteLabelReports,
    TeamSeats,
    PrioritySupport,
}

impl Feature {
    pub fn all() -> &'static [Feature] {
        &[
            Feature::ApiAccess,
            Feature::ScheduledAudits,
            Feature::BulkExport,
            Feature::CompetitorTracking,
            Feature::WhiteLabelReports,
            Feature::TeamSeats,
            Feature::PrioritySupport,
        ]
    }
}
