use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::app_error::AppResult;
use crate::domain::entities::entitlement::TenantEntitlement;

/// Result of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    Stored,
    /// The stored version no longer matches the expected one; the caller
    /// must re-read and recompute before trying again.
    Conflict,
}

/// Contract for the per-tenant entitlement document store.
///
/// All mutation goes through [`compare_and_swap`]; callers never perform
/// blind overwrites. The adapter is datastore-agnostic — any backend that
/// can do a version-checked conditional write satisfies it.
///
/// [`compare_and_swap`]: EntitlementStore::compare_and_swap
#[async_trait]
pub trait EntitlementStore: Send + Sync {
    async fn get(&self, tenant_id: Uuid) -> AppResult<Option<TenantEntitlement>>;

    /// Insert the default document if none exists yet, returning whatever is
    /// stored afterwards. Racing creators must converge on a single row.
    async fn create_default(
        &self,
        entitlement: &TenantEntitlement,
    ) -> AppResult<TenantEntitlement>;

    /// Write `next` only if the stored document's `updated_at` still equals
    /// `expected_updated_at`.
    async fn compare_and_swap(
        &self,
        expected_updated_at: DateTime<Utc>,
        next: &TenantEntitlement,
    ) -> AppResult<CasOutcome>;
}
