//! The reconciliation state machine: maps normalized billing events to
//! entitlement mutations with at-most-once effect, ordering protection, and
//! optimistic-concurrency retries.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::app_error::{AppError, AppResult};
use crate::application::ports::entitlement_store::{CasOutcome, EntitlementStore};
use crate::application::ports::processed_events::ProcessedEventRepo;
use crate::application::tier_catalog;
use crate::application::use_cases::entitlement::load_or_create;
use crate::domain::entities::billing_event::{
    BillingEvent, BillingEventKind, SubscriptionPayload, SubscriptionUpdatePayload,
};
use crate::domain::entities::entitlement::{
    EntitlementStatus, PaymentOutcome, QuotaState, TenantEntitlement,
};
use crate::domain::entities::processed_event::ProcessedEvent;
use crate::domain::entities::tier::Tier;

/// Conditional-write attempts before giving up on an event.
pub const MAX_CAS_ATTEMPTS: u32 = 5;
const RETRY_BASE_DELAY_MS: u64 = 25;
const RETRY_JITTER_MS: u64 = 25;

/// What processing a billing event did. Everything here is a success from
/// the webhook receiver's point of view; only [`AppError`] values are not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Applied { effect: String },
    /// The event id was already processed; delivery is a no-op.
    Duplicate,
    /// The event is older than already-applied state and was discarded.
    Stale,
    /// The event is valid but has no legal transition from current state.
    Ignored { reason: String },
}

enum Transition {
    Apply(TenantEntitlement),
    Stale,
    Ignore(String),
}

#[derive(Clone)]
pub struct ReconciliationEngine {
    store: Arc<dyn EntitlementStore>,
    processed: Arc<dyn ProcessedEventRepo>,
}

impl ReconciliationEngine {
    pub fn new(
        store: Arc<dyn EntitlementStore>,
        processed: Arc<dyn ProcessedEventRepo>,
    ) -> Self {
        Self { store, processed }
    }

    /// Apply one normalized billing event.
    ///
    /// The whole body is safe to re-run from scratch: state is recomputed
    /// from a fresh read on every attempt, so a conditional-write conflict
    /// with a concurrent event for the same tenant converges instead of
    /// blindly retrying a stale write.
    pub async fn process(&self, event: &BillingEvent) -> AppResult<ReconcileOutcome> {
        for attempt in 0..MAX_CAS_ATTEMPTS {
            if self.processed.has_processed(&event.event_id).await? {
                debug!(
                    event_id = %event.event_id,
                    kind = event.kind.as_str(),
                    "duplicate delivery, skipping"
                );
                return Ok(ReconcileOutcome::Duplicate);
            }

            let current = load_or_create(&self.store, event.tenant_id).await?;

            match apply_event(&current, event) {
                Transition::Stale => {
                    info!(
                        event_id = %event.event_id,
                        kind = event.kind.as_str(),
                        occurred_at = %event.occurred_at,
                        last_event_seq = ?current.last_event_seq,
                        "discarding stale event"
                    );
                    let effect = format!("{}: stale, discarded", event.kind.as_str());
                    self.record(event, &effect).await?;
                    return Ok(ReconcileOutcome::Stale);
                }
                Transition::Ignore(reason) => {
                    info!(
                        event_id = %event.event_id,
                        kind = event.kind.as_str(),
                        reason = %reason,
                        "ignoring event with no legal transition"
                    );
                    let effect = format!("{}: ignored ({})", event.kind.as_str(), reason);
                    self.record(event, &effect).await?;
                    return Ok(ReconcileOutcome::Ignored { reason });
                }
                Transition::Apply(mut next) => {
                    if next == current {
                        let effect = format!("{}: no change", event.kind.as_str());
                        self.record(event, &effect).await?;
                        return Ok(ReconcileOutcome::Applied { effect });
                    }

                    let effect = format!(
                        "{}: {}/{} -> {}/{}",
                        event.kind.as_str(),
                        current.status,
                        current.tier,
                        next.status,
                        next.tier
                    );
                    next.updated_at = Utc::now();

                    match self.store.compare_and_swap(current.updated_at, &next).await? {
                        CasOutcome::Stored => {
                            self.record(event, &effect).await?;
                            info!(
                                tenant_id = %event.tenant_id,
                                event_id = %event.event_id,
                                effect = %effect,
                                "applied billing event"
                            );
                            return Ok(ReconcileOutcome::Applied { effect });
                        }
                        CasOutcome::Conflict => {
                            warn!(
                                tenant_id = %event.tenant_id,
                                event_id = %event.event_id,
                                attempt,
                                "conditional write lost the race, re-reading"
                            );
                            tokio::time::sleep(retry_backoff(attempt)).await;
                        }
                    }
                }
            }
        }

        // Keep the full payload in the log so the event can be replayed by
        // hand; it is NOT marked processed, so provider redelivery retries it.
        error!(
            tenant_id = %event.tenant_id,
            event_id = %event.event_id,
            payload = %serde_json::to_string(event).unwrap_or_default(),
            "retry budget exhausted, reconciliation failed"
        );
        Err(AppError::ReconciliationFailed(format!(
            "retry budget exhausted after {} attempts for event {}",
            MAX_CAS_ATTEMPTS, event.event_id
        )))
    }

    async fn record(&self, event: &BillingEvent, effect: &str) -> AppResult<()> {
        self.processed
            .mark_processed(&ProcessedEvent {
                event_id: event.event_id.clone(),
                tenant_id: event.tenant_id,
                effect: effect.to_string(),
                processed_at: Utc::now(),
            })
            .await
    }
}

/// Compute the transition an event causes, purely from event content and
/// current state. No clocks, no I/O: replaying the same event against the
/// same state always produces the same result.
fn apply_event(current: &TenantEntitlement, event: &BillingEvent) -> Transition {
    // A subscription-shaped event older than the newest applied one must
    // not roll state back (e.g. a delayed update resurrecting a canceled
    // tier). Payment events are exempt: they are history, handled below
    // with their own guards.
    let stale = current
        .last_event_seq
        .is_some_and(|seq| event.occurred_at < seq);
    if stale && !event.kind.is_payment() {
        return Transition::Stale;
    }

    let mut next = current.clone();

    match &event.kind {
        BillingEventKind::CheckoutCompleted(payload) => {
            apply_subscription_start(&mut next, payload);
        }
        BillingEventKind::SubscriptionCreated(payload) => {
            // Only a fresh checkout may bring a canceled tenant back.
            if current.status == EntitlementStatus::Canceled {
                return Transition::Ignore(
                    "canceled tenant can only return via checkout".into(),
                );
            }
            apply_subscription_start(&mut next, payload);
        }
        BillingEventKind::SubscriptionUpdated(payload) => {
            match current.status {
                EntitlementStatus::Canceled => {
                    return Transition::Ignore("update for canceled tenant".into());
                }
                EntitlementStatus::Free => {
                    return Transition::Ignore(
                        "update without a subscription on record".into(),
                    );
                }
                EntitlementStatus::Active | EntitlementStatus::PastDue => {}
            }
            apply_subscription_update(&mut next, payload, event.occurred_at);
        }
        BillingEventKind::SubscriptionCanceled => {
            if !current.status.has_subscription() {
                return Transition::Ignore("no active subscription to cancel".into());
            }
            apply_cancellation(&mut next);
        }
        BillingEventKind::PaymentSucceeded(_) => {
            apply_payment(&mut next, PaymentOutcome::Succeeded, event.occurred_at, stale);
        }
        BillingEventKind::PaymentFailed(_) => {
            apply_payment(&mut next, PaymentOutcome::Failed, event.occurred_at, stale);
        }
    }

    next.last_event_seq = Some(match current.last_event_seq {
        Some(seq) => seq.max(event.occurred_at),
        None => event.occurred_at,
    });

    Transition::Apply(next)
}

/// `checkout_completed` / `subscription_created`: a new paid period starts,
/// so limits come from the plan and every counter starts at zero.
fn apply_subscription_start(next: &mut TenantEntitlement, payload: &SubscriptionPayload) {
    next.tier = payload.plan;
    next.status = EntitlementStatus::Active;
    next.billing_ref = Some(payload.billing_ref.clone());
    next.period_end = Some(payload.period_end);
    next.cancel_at_period_end = payload.cancel_at_period_end;
    next.quotas = fresh_quotas(payload.plan);
}

fn apply_subscription_update(
    next: &mut TenantEntitlement,
    payload: &SubscriptionUpdatePayload,
    occurred_at: DateTime<Utc>,
) {
    if let Some(plan) = payload.plan {
        if plan != next.tier {
            next.tier = plan;
            // Plan change mid-period: limits change, usage carries over.
            next.apply_limits(&tier_catalog::limits_for(plan));
        }
    }

    match payload.status {
        EntitlementStatus::Active => next.status = EntitlementStatus::Active,
        EntitlementStatus::PastDue => next.status = EntitlementStatus::PastDue,
        // The normalizer never produces these for an update; cancellation
        // arrives as its own event kind.
        EntitlementStatus::Free | EntitlementStatus::Canceled => {}
    }

    if let Some(period_end) = payload.period_end {
        // Period rollover: a changed, still-future period end means the
        // billing period advanced, and usage resets exactly once. Events
        // repeating the same period end must not reset again.
        if next.period_end != Some(period_end) && period_end > occurred_at {
            next.reset_usage();
        }
        next.period_end = Some(period_end);
    }

    next.cancel_at_period_end = payload.cancel_at_period_end;
}

fn apply_cancellation(next: &mut TenantEntitlement) {
    next.status = EntitlementStatus::Canceled;
    next.tier = Tier::Free;
    next.billing_ref = None;
    next.period_end = None;
    next.cancel_at_period_end = false;
    next.quotas = fresh_quotas(Tier::Free);
}

/// Payment events record history on every delivery but flip status only
/// when in-order: `Active -> PastDue` on failure, `PastDue -> Active` on
/// success. They never touch tier and never regress a canceled account.
fn apply_payment(
    next: &mut TenantEntitlement,
    outcome: PaymentOutcome,
    occurred_at: DateTime<Utc>,
    stale: bool,
) {
    let newer = next.last_payment_at.is_none_or(|at| occurred_at >= at);
    if newer {
        next.last_payment_status = Some(outcome);
        next.last_payment_at = Some(occurred_at);
    }

    if !stale {
        match outcome {
            PaymentOutcome::Failed => {
                if next.status == EntitlementStatus::Active {
                    next.status = EntitlementStatus::PastDue;
                }
            }
            PaymentOutcome::Succeeded => {
                if next.status == EntitlementStatus::PastDue {
                    next.status = EntitlementStatus::Active;
                }
            }
        }
    }
}

fn fresh_quotas(tier: Tier) -> std::collections::BTreeMap<String, QuotaState> {
    tier_catalog::limits_for(tier)
        .into_iter()
        .map(|(name, limit)| (name, QuotaState::new(limit)))
        .collect()
}

fn retry_backoff(attempt: u32) -> Duration {
    let base = RETRY_BASE_DELAY_MS.saturating_mul(1u64 << attempt.min(8));
    let jitter = rand::random::<u64>() % RETRY_JITTER_MS;
    Duration::from_millis(base + jitter)
}
