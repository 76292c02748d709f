use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::app_error::AppResult;
use crate::domain::entities::processed_event::ProcessedEvent;

/// Contract for the event deduplication ledger.
///
/// Entries are written once per distinct provider event id and never
/// mutated. The engine applies mutations idempotently (new state is derived
/// purely from event content plus current state), so a redelivery that slips
/// in before [`mark_processed`] lands is harmless.
///
/// [`mark_processed`]: ProcessedEventRepo::mark_processed
#[async_trait]
pub trait ProcessedEventRepo: Send + Sync {
    async fn has_processed(&self, event_id: &str) -> AppResult<bool>;

    /// Record the event's effect. Must be idempotent: a second call with the
    /// same event id leaves the original record untouched.
    async fn mark_processed(&self, event: &ProcessedEvent) -> AppResult<()>;

    /// Recent history for a tenant, newest first.
    async fn list_by_tenant(
        &self,
        tenant_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<ProcessedEvent>>;

    /// Delete entries processed before `cutoff`, returning the count.
    /// Callers must derive `cutoff` from the provider's redelivery window so
    /// the purge can never touch an entry the provider might still redeliver.
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> AppResult<u64>;
}
