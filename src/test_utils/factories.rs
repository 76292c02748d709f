//! Factories for billing events used across tests.

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::domain::entities::billing_event::{
    BillingEvent, BillingEventKind, PaymentPayload, SubscriptionPayload,
    SubscriptionUpdatePayload,
};
use crate::domain::entities::entitlement::EntitlementStatus;
use crate::domain::entities::tier::Tier;

/// Fixed-epoch timestamp helper so tests order events explicitly.
pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().expect("valid timestamp")
}

pub fn sub_payload(plan: Tier, period_end: DateTime<Utc>) -> SubscriptionPayload {
    SubscriptionPayload {
        plan,
        billing_ref: "sub_test".to_string(),
        period_end,
        cancel_at_period_end: false,
    }
}

pub fn checkout_event(
    event_id: &str,
    tenant_id: Uuid,
    occurred_at: DateTime<Utc>,
    plan: Tier,
    period_end: DateTime<Utc>,
) -> BillingEvent {
    BillingEvent {
        event_id: event_id.to_string(),
        tenant_id,
        occurred_at,
        kind: BillingEventKind::CheckoutCompleted(sub_payload(plan, period_end)),
    }
}

pub fn created_event(
    event_id: &str,
    tenant_id: Uuid,
    occurred_at: DateTime<Utc>,
    plan: Tier,
    period_end: DateTime<Utc>,
) -> BillingEvent {
    BillingEvent {
        event_id: event_id.to_string(),
        tenant_id,
        occurred_at,
        kind: BillingEventKind::SubscriptionCreated(sub_payload(plan, period_end)),
    }
}

pub fn update_event(
    event_id: &str,
    tenant_id: Uuid,
    occurred_at: DateTime<Utc>,
    plan: Option<Tier>,
    status: EntitlementStatus,
    period_end: Option<DateTime<Utc>>,
) -> BillingEvent {
    BillingEvent {
        event_id: event_id.to_string(),
        tenant_id,
        occurred_at,
        kind: BillingEventKind::SubscriptionUpdated(SubscriptionUpdatePayload {
            plan,
            status,
            period_end,
            cancel_at_period_end: false,
        }),
    }
}

pub fn cancel_event(
    event_id: &str,
    tenant_id: Uuid,
    occurred_at: DateTime<Utc>,
) -> BillingEvent {
    BillingEvent {
        event_id: event_id.to_string(),
        tenant_id,
        occurred_at,
        kind: BillingEventKind::SubscriptionCanceled,
    }
}

pub fn payment_succeeded_event(
    event_id: &str,
    tenant_id: Uuid,
    occurred_at: DateTime<Utc>,
) -> BillingEvent {
    BillingEvent {
        event_id: event_id.to_string(),
        tenant_id,
        occurred_at,
        kind: BillingEventKind::PaymentSucceeded(PaymentPayload {
            billing_ref: Some("sub_test".to_string()),
            amount_cents: Some(4_900),
            failure_message: None,
        }),
    }
}

pub fn payment_failed_event(
    event_id: &str,
    tenant_id: Uuid,
    occurred_at: DateTime<Utc>,
) -> BillingEvent {
    BillingEvent {
        event_id: event_id.to_string(),
        tenant_id,
        occurred_at,
        kind: BillingEventKind::PaymentFailed(PaymentPayload {
            billing_ref: Some("sub_test".to_string()),
            amount_cents: Some(4_900),
            failure_message: Some("card_declined".to_string()),
        }),
    }
}
