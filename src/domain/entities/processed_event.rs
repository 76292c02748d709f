use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Append-only record of a billing event that has been handled.
///
/// One row per distinct provider event id, never mutated. Rows older than
/// the provider's redelivery window are eligible for garbage collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedEvent {
    pub event_id: String,
    pub tenant_id: Uuid,
    /// Idempotent summary of the mutation the event caused, for audit and
    /// manual replay triage (e.g. `"checkout_completed: free/free -> active/starter"`).
    pub effect: String,
    pub processed_at: DateTime<Utc>,
}
