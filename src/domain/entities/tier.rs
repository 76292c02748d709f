use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Subscription tier. Variant order is the hierarchy: a later tier grants
/// everything an earlier one does.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    sqlx::Type,
    AsRefStr,
    Display,
    EnumString,
)]
#[sqlx(type_name = "tier", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[derive(Default)]
pub enum Tier {
    #[default]
    Free,
    Starter,
    Agency,
    Enterprise,
    Admin,
}

impl Tier {
    /// Position in the hierarchy, starting at 0 for `Free`.
    pub fn rank(&self) -> usize {
        *self as usize
    }

    /// Whether this tier satisfies a gate requiring `required`.
    pub fn meets(&self, required: Tier) -> bool {
        self.rank() >= required.rank()
    }

    /// Whether this tier is attached to a paid subscription.
    pub fn is_paid(&self) -> bool {
        !matches!(self, Tier::Free)
    }

    pub fn all() -> &'static [Tier] {
        &[
            Tier::Free,
            Tier::Starter,
            Tier::Agency,
            Tier::Enterprise,
            Tier::Admin,
        ]
    }
}
