use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::entitlement::EntitlementStatus;
use super::tier::Tier;

/// A payment-provider notification after verification and normalization.
///
/// This is the only shape the reconciliation engine accepts: the webhook
/// receiver checks the signature and maps the provider's loose JSON into this
/// closed set before the core ever sees the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingEvent {
    /// Provider-assigned unique identifier, the deduplication key.
    pub event_id: String,
    pub tenant_id: Uuid,
    /// Provider-side occurrence time; orders events for staleness rejection.
    pub occurred_at: DateTime<Utc>,
    pub kind: BillingEventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BillingEventKind {
    CheckoutCompleted(SubscriptionPayload),
    SubscriptionCreated(SubscriptionPayload),
    SubscriptionUpdated(SubscriptionUpdatePayload),
    SubscriptionCanceled,
    PaymentSucceeded(PaymentPayload),
    PaymentFailed(PaymentPayload),
}

impl BillingEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingEventKind::CheckoutCompleted(_) => "checkout_completed",
            BillingEventKind::SubscriptionCreated(_) => "subscription_created",
            BillingEventKind::SubscriptionUpdated(_) => "subscription_updated",
            BillingEventKind::SubscriptionCanceled => "subscription_canceled",
            BillingEventKind::PaymentSucceeded(_) => "payment_succeeded",
            BillingEventKind::PaymentFailed(_) => "payment_failed",
        }
    }

    /// Payment events are informational history: they are exempt from
    /// staleness rejection and never regress tier or status.
    pub fn is_payment(&self) -> bool {
        matches!(
            self,
            BillingEventKind::PaymentSucceeded(_) | BillingEventKind::PaymentFailed(_)
        )
    }
}

/// Subscription details carried by checkout/created events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionPayload {
    pub plan: Tier,
    /// Provider subscription reference (e.g. `sub_...`).
    pub billing_ref: String,
    pub period_end: DateTime<Utc>,
    pub cancel_at_period_end: bool,
}

/// Fields a `subscription_updated` event may change. The normalizer only
/// produces `Active` or `PastDue` here; a provider update carrying a
/// canceled status normalizes to `SubscriptionCanceled` instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionUpdatePayload {
    /// Present when the provider reports a plan change.
    pub plan: Option<Tier>,
    pub status: EntitlementStatus,
    pub period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
}

/// Informational payment details. These never drive tier changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentPayload {
    pub billing_ref: Option<String>,
    pub amount_cents: Option<i64>,
    pub failure_message: Option<String>,
}
