//! Request-time quota enforcement: atomic check-then-increment against the
//! entitlement document, serialized per tenant by the same conditional-write
//! discipline the reconciliation engine uses.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::ports::entitlement_store::{CasOutcome, EntitlementStore};
use crate::application::use_cases::entitlement::load_or_create;
use crate::domain::entities::entitlement::UNLIMITED;

/// Conditional-write attempts before surfacing a retryable error.
pub const MAX_CAS_ATTEMPTS: u32 = 5;
const RETRY_BASE_DELAY_MS: u64 = 10;
const RETRY_JITTER_MS: u64 = 15;

/// Outcome of a quota check. `LimitExceeded` is an expected, user-visible
/// result (the UI shows an upgrade prompt), not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum QuotaDecision {
    /// `remaining` is the post-increment headroom; `-1` means unlimited.
    Allowed { remaining: i64 },
    LimitExceeded { remaining: i64 },
}

impl QuotaDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, QuotaDecision::Allowed { .. })
    }

    pub fn remaining(&self) -> i64 {
        match self {
            QuotaDecision::Allowed { remaining } => *remaining,
            QuotaDecision::LimitExceeded { remaining } => *remaining,
        }
    }
}

#[derive(Clone)]
pub struct QuotaEnforcer {
    store: Arc<dyn EntitlementStore>,
}

impl QuotaEnforcer {
    pub fn new(store: Arc<dyn EntitlementStore>) -> Self {
        Self { store }
    }

    /// Consume `amount` units of `quota` for a tenant if the limit allows.
    ///
    /// Check and increment happen atomically: the increment is written with
    /// a conditional write against the state the check read, so two
    /// concurrent calls racing for the last unit cannot both pass. Usage is
    /// never decremented here; there is no reservation/compensation
    /// protocol, deliberately.
    pub async fn check_and_increment(
        &self,
        tenant_id: Uuid,
        quota: &str,
        amount: i64,
    ) -> AppResult<QuotaDecision> {
        if amount < 1 {
            return Err(AppError::InvalidInput(format!(
                "quota amount must be positive, got {}",
                amount
            )));
        }

        for attempt in 0..MAX_CAS_ATTEMPTS {
            let current = load_or_create(&self.store, tenant_id).await?;

            let mut next = current.clone();
            let Some(counter) = next.quotas.get_mut(quota) else {
                return Err(AppError::InvalidInput(format!(
                    "unknown quota counter: {}",
                    quota
                )));
            };

            if counter.would_exceed(amount) {
                debug!(
                    tenant_id = %tenant_id,
                    quota,
                    used = counter.used,
                    limit = counter.limit,
                    "quota limit reached"
                );
                return Ok(QuotaDecision::LimitExceeded {
                    remaining: counter.remaining(),
                });
            }

            counter.used += amount;
            let remaining = if counter.is_unlimited() {
                UNLIMITED
            } else {
                counter.remaining()
            };
            next.updated_at = Utc::now();

            match self.store.compare_and_swap(current.updated_at, &next).await? {
                CasOutcome::Stored => {
                    return Ok(QuotaDecision::Allowed { remaining });
                }
                CasOutcome::Conflict => {
                    warn!(
                        tenant_id = %tenant_id,
                        quota,
                        attempt,
                        "quota increment lost the race, re-reading"
                    );
                    tokio::time::sleep(retry_backoff(attempt)).await;
                }
            }
        }

        // The caller (request middleware) treats this as retryable; quota
        // state is untouched because no write landed.
        Err(AppError::ConcurrencyConflict)
    }
}

fn retry_backoff(attempt: u32) -> Duration {
    let base = RETRY_BASE_DELAY_MS.saturating_mul(1u64 << attempt.min(8));
    let jitter = rand::random::<u64>() % RETRY_JITTER_MS;
    Duration::from_millis(base + jitter)
}
