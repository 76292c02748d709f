//! Payment-provider webhook receiver.
//!
//! Verifies delivery authenticity, normalizes the provider's loose JSON into
//! the closed [`BillingEvent`] set, and hands the result to the
//! reconciliation engine. The response code is the retry protocol: 2xx
//! acknowledges (including no-ops and non-retryable failures), 5xx asks the
//! provider to redeliver.

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde_json::Value as JsonValue;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::adapters::http::app_state::AppState;
use crate::app_error::{AppError, AppResult};
use crate::domain::entities::billing_event::{
    BillingEvent, BillingEventKind, PaymentPayload, SubscriptionPayload,
    SubscriptionUpdatePayload,
};
use crate::domain::entities::entitlement::EntitlementStatus;
use crate::domain::entities::tier::Tier;
use crate::infra::webhook_signature::verify_webhook_signature;

pub fn router() -> Router<AppState> {
    Router::new().route("/webhook", post(handle_webhook))
}

// ============================================================================
// Helper Functions
// ============================================================================

fn timestamp_to_utc(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(secs, 0)
}

/// Determines if a webhook processing error should trigger a provider retry.
///
/// Returns `true` for transient errors, meaning we return 5xx so the
/// provider redelivers. Returns `false` for conditions a retry cannot fix,
/// meaning we return 2xx and log.
fn is_retryable_error(error: &AppError) -> bool {
    match error {
        // Transient - retry may succeed
        AppError::Database(_) => true,
        AppError::Internal(_) => true,
        AppError::ConcurrencyConflict => true,
        AppError::ReconciliationFailed(_) => true,

        // Won't change with retry
        AppError::InvalidEvent(_) => false,
        AppError::InvalidInput(_) => false,
        AppError::NotFound => false,
    }
}

// ============================================================================
// Handler
// ============================================================================

/// POST /api/billing/webhook
async fn handle_webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> AppResult<StatusCode> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::InvalidEvent("Missing signature header".into()))?;

    verify_webhook_signature(
        &body,
        signature,
        app_state.config.webhook_secret.expose_secret(),
    )?;

    let raw: JsonValue = serde_json::from_str(&body)
        .map_err(|e| AppError::InvalidEvent(format!("Invalid webhook payload: {}", e)))?;

    let Some(event) = normalize_provider_event(&raw)? else {
        // Verified but not a kind we reconcile; acknowledge so the provider
        // does not redeliver it forever.
        return Ok(StatusCode::OK);
    };

    match app_state.engine.process(&event).await {
        Ok(outcome) => {
            info!(
                event_id = %event.event_id,
                kind = event.kind.as_str(),
                outcome = ?outcome,
                "webhook processed"
            );
            Ok(StatusCode::OK)
        }
        Err(e) if is_retryable_error(&e) => {
            error!(
                error = %e,
                event_id = %event.event_id,
                kind = event.kind.as_str(),
                retryable = true,
                "Webhook processing failed, returning 500 for provider retry"
            );
            Ok(StatusCode::INTERNAL_SERVER_ERROR)
        }
        Err(e) => {
            debug!(
                error = %e,
                event_id = %event.event_id,
                retryable = false,
                "Non-retryable webhook failure, acknowledging"
            );
            Ok(StatusCode::OK)
        }
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Map a verified provider event to the closed [`BillingEvent`] set.
///
/// `Ok(None)` means "verified but not ours to reconcile" (unhandled type,
/// one-time payment, a subscription created outside this product).
/// Malformed payloads are rejected as [`AppError::InvalidEvent`] and never
/// reach the engine.
pub(crate) fn normalize_provider_event(raw: &JsonValue) -> AppResult<Option<BillingEvent>> {
    let event_id = raw["id"]
        .as_str()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::InvalidEvent("missing event id".into()))?;
    let event_type = raw["type"].as_str().unwrap_or("");
    let occurred_at = raw["created"]
        .as_i64()
        .and_then(timestamp_to_utc)
        .ok_or_else(|| AppError::InvalidEvent("missing or invalid event timestamp".into()))?;
    let object = &raw["data"]["object"];

    let normalized = match event_type {
        "checkout.session.completed" => normalize_checkout(object, event_id)?,
        "customer.subscription.created"
        | "customer.subscription.updated"
        | "customer.subscription.deleted" => {
            normalize_subscription(object, event_type, event_id)?
        }
        "invoice.paid" | "invoice.payment_succeeded" => {
            normalize_invoice(object, event_id, true)?
        }
        "invoice.payment_failed" => normalize_invoice(object, event_id, false)?,
        _ => {
            debug!(event_id, event_type, "unhandled provider event type");
            None
        }
    };

    Ok(normalized.map(|(tenant_id, kind)| BillingEvent {
        event_id: event_id.to_string(),
        tenant_id,
        occurred_at,
        kind,
    }))
}

fn normalize_checkout(
    session: &JsonValue,
    event_id: &str,
) -> AppResult<Option<(Uuid, BillingEventKind)>> {
    let Some(tenant_ref) = session["client_reference_id"].as_str() else {
        // One-time payment or a session we did not create.
        debug!(event_id, "checkout session without client_reference_id, skipping");
        return Ok(None);
    };
    let tenant_id = parse_tenant_id(tenant_ref)?;

    // The session must carry the subscription expanded into the payload; a
    // bare reference is covered by the matching subscription.created event.
    let subscription = &session["subscription"];
    if !subscription.is_object() {
        debug!(
            event_id,
            "checkout session without expanded subscription, deferring to subscription event"
        );
        return Ok(None);
    }

    let payload = subscription_payload(subscription)?;
    Ok(Some((tenant_id, BillingEventKind::CheckoutCompleted(payload))))
}

fn normalize_subscription(
    subscription: &JsonValue,
    event_type: &str,
    event_id: &str,
) -> AppResult<Option<(Uuid, BillingEventKind)>> {
    let Some(tenant_ref) = subscription["metadata"]["tenant_id"].as_str() else {
        debug!(event_id, "subscription without tenant metadata, skipping");
        return Ok(None);
    };
    let tenant_id = parse_tenant_id(tenant_ref)?;

    let kind = match event_type {
        "customer.subscription.created" => {
            BillingEventKind::SubscriptionCreated(subscription_payload(subscription)?)
        }
        "customer.subscription.deleted" => BillingEventKind::SubscriptionCanceled,
        _ => {
            let status = subscription["status"].as_str().unwrap_or("");
            match status {
                // A terminal status update is a cancellation in its own right.
                "canceled" | "incomplete_expired" => BillingEventKind::SubscriptionCanceled,
                _ => BillingEventKind::SubscriptionUpdated(SubscriptionUpdatePayload {
                    plan: plan_from_items(subscription)?,
                    status: update_status(status)?,
                    period_end: subscription["current_period_end"]
                        .as_i64()
                        .and_then(timestamp_to_utc),
                    cancel_at_period_end: subscription["cancel_at_period_end"]
                        .as_bool()
                        .unwrap_or(false),
                }),
            }
        }
    };

    Ok(Some((tenant_id, kind)))
}

fn normalize_invoice(
    invoice: &JsonValue,
    event_id: &str,
    succeeded: bool,
) -> AppResult<Option<(Uuid, BillingEventKind)>> {
    let tenant_ref = invoice["metadata"]["tenant_id"]
        .as_str()
        .or_else(|| invoice["subscription_details"]["metadata"]["tenant_id"].as_str());
    let Some(tenant_ref) = tenant_ref else {
        debug!(event_id, "invoice without tenant metadata, skipping");
        return Ok(None);
    };
    let tenant_id = parse_tenant_id(tenant_ref)?;

    let payload = PaymentPayload {
        billing_ref: invoice["subscription"].as_str().map(|s| s.to_string()),
        amount_cents: if succeeded {
            invoice["amount_paid"].as_i64()
        } else {
            invoice["amount_due"].as_i64()
        },
        failure_message: if succeeded {
            None
        } else {
            invoice["last_finalization_error"]["message"]
                .as_str()
                .or_else(|| invoice["last_payment_error"]["message"].as_str())
                .map(|s| s.to_string())
        },
    };

    let kind = if succeeded {
        BillingEventKind::PaymentSucceeded(payload)
    } else {
        BillingEventKind::PaymentFailed(payload)
    };
    Ok(Some((tenant_id, kind)))
}

fn subscription_payload(subscription: &JsonValue) -> AppResult<SubscriptionPayload> {
    let plan = plan_from_items(subscription)?
        .ok_or_else(|| AppError::InvalidEvent("subscription without a plan price".into()))?;
    let billing_ref = subscription["id"]
        .as_str()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::InvalidEvent("subscription without an id".into()))?;
    let period_end = subscription["current_period_end"]
        .as_i64()
        .and_then(timestamp_to_utc)
        .ok_or_else(|| AppError::InvalidEvent("subscription without current_period_end".into()))?;

    Ok(SubscriptionPayload {
        plan,
        billing_ref: billing_ref.to_string(),
        period_end,
        cancel_at_period_end: subscription["cancel_at_period_end"]
            .as_bool()
            .unwrap_or(false),
    })
}

/// Plan identifier from the first subscription item's price lookup key.
fn plan_from_items(subscription: &JsonValue) -> AppResult<Option<Tier>> {
    let Some(lookup_key) = subscription["items"]["data"]
        .as_array()
        .and_then(|items| items.first())
        .and_then(|item| item["price"]["lookup_key"].as_str())
    else {
        return Ok(None);
    };
    lookup_key
        .parse::<Tier>()
        .map(Some)
        .map_err(|_| AppError::InvalidEvent(format!("unknown plan: {}", lookup_key)))
}

fn update_status(status: &str) -> AppResult<EntitlementStatus> {
    match status {
        "active" | "trialing" => Ok(EntitlementStatus::Active),
        "past_due" | "unpaid" => Ok(EntitlementStatus::PastDue),
        other => Err(AppError::InvalidEvent(format!(
            "unrecognized subscription status: {}",
            other
        ))),
    }
}

fn parse_tenant_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw)
        .map_err(|_| AppError::InvalidEvent(format!("invalid tenant id: {}", raw)))
}
