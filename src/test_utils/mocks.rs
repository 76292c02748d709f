//! In-memory mock implementations of the store ports.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::app_error::AppResult;
use crate::application::ports::entitlement_store::{CasOutcome, EntitlementStore};
use crate::application::ports::processed_events::ProcessedEventRepo;
use crate::domain::entities::entitlement::TenantEntitlement;
use crate::domain::entities::processed_event::ProcessedEvent;

// ============================================================================
// InMemoryEntitlementStore
// ============================================================================

/// Entitlement store with real compare-and-swap semantics, plus a knob to
/// force the next N conditional writes to report a conflict.
#[derive(Default)]
pub struct InMemoryEntitlementStore {
    pub docs: Mutex<HashMap<Uuid, TenantEntitlement>>,
    forced_conflicts: AtomicU32,
}

impl InMemoryEntitlementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` compare_and_swap calls fail with a conflict.
    pub fn force_conflicts(&self, n: u32) {
        self.forced_conflicts.store(n, Ordering::SeqCst);
    }

    /// Directly add usage to a counter, bypassing the quota enforcer.
    /// Panics if the tenant or counter does not exist.
    pub fn bump_usage(&self, tenant_id: Uuid, quota: &str, amount: i64) {
        let mut docs = self.docs.lock().unwrap();
        let doc = docs.get_mut(&tenant_id).expect("tenant not seeded");
        doc.quotas.get_mut(quota).expect("unknown counter").used += amount;
    }
}

#[async_trait]
impl EntitlementStore for InMemoryEntitlementStore {
    async fn get(&self, tenant_id: Uuid) -> AppResult<Option<TenantEntitlement>> {
        Ok(self.docs.lock().unwrap().get(&tenant_id).cloned())
    }

    async fn create_default(
        &self,
        entitlement: &TenantEntitlement,
    ) -> AppResult<TenantEntitlement> {
        let mut docs = self.docs.lock().unwrap();
        let stored = docs
            .entry(entitlement.tenant_id)
            .or_insert_with(|| entitlement.clone());
        Ok(stored.clone())
    }

    async fn compare_and_swap(
        &self,
        expected_updated_at: DateTime<Utc>,
        next: &TenantEntitlement,
    ) -> AppResult<CasOutcome> {
        if self
            .forced_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Ok(CasOutcome::Conflict);
        }

        let mut docs = self.docs.lock().unwrap();
        match docs.get(&next.tenant_id) {
            Some(current) if current.updated_at == expected_updated_at => {
                docs.insert(next.tenant_id, next.clone());
                Ok(CasOutcome::Stored)
            }
            _ => Ok(CasOutcome::Conflict),
        }
    }
}

// ============================================================================
// InMemoryProcessedEventRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryProcessedEventRepo {
    pub events: Mutex<HashMap<String, ProcessedEvent>>,
}

impl InMemoryProcessedEventRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

#[async_trait]
impl ProcessedEventRepo for InMemoryProcessedEventRepo {
    async fn has_processed(&self, event_id: &str) -> AppResult<bool> {
        Ok(self.events.lock().unwrap().contains_key(event_id))
    }

    async fn mark_processed(&self, event: &ProcessedEvent) -> AppResult<()> {
        self.events
            .lock()
            .unwrap()
            .entry(event.event_id.clone())
            .or_insert_with(|| event.clone());
        Ok(())
    }

    async fn list_by_tenant(
        &self,
        tenant_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<ProcessedEvent>> {
        let events = self.events.lock().unwrap();
        let mut matching: Vec<ProcessedEvent> = events
            .values()
            .filter(|e| e.tenant_id == tenant_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.processed_at.cmp(&a.processed_at));
        matching.truncate(limit.max(0) as usize);
        Ok(matching)
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let mut events = self.events.lock().unwrap();
        let before = events.len();
        events.retain(|_, e| e.processed_at >= cutoff);
        Ok((before - events.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::tier_catalog::free_entitlement;

    #[tokio::test]
    async fn cas_rejects_writes_against_a_stale_version() {
        let store = InMemoryEntitlementStore::new();
        let doc = free_entitlement(Uuid::new_v4(), Utc::now());
        store.create_default(&doc).await.unwrap();

        let mut next = doc.clone();
        next.updated_at = Utc::now();
        assert_eq!(
            store.compare_and_swap(doc.updated_at, &next).await.unwrap(),
            CasOutcome::Stored
        );

        // Writing again with the original token must conflict.
        let mut again = doc.clone();
        again.updated_at = Utc::now();
        assert_eq!(
            store.compare_and_swap(doc.updated_at, &again).await.unwrap(),
            CasOutcome::Conflict
        );
    }

    #[tokio::test]
    async fn create_default_is_first_writer_wins() {
        let store = InMemoryEntitlementStore::new();
        let tenant = Uuid::new_v4();
        let first = free_entitlement(tenant, Utc::now());
        let second = free_entitlement(tenant, Utc::now() + chrono::Duration::seconds(5));

        let stored_first = store.create_default(&first).await.unwrap();
        let stored_second = store.create_default(&second).await.unwrap();
        assert_eq!(stored_first, stored_second);
    }

    #[tokio::test]
    async fn mark_processed_keeps_the_original_record() {
        let repo = InMemoryProcessedEventRepo::new();
        let tenant = Uuid::new_v4();
        let original = ProcessedEvent {
            event_id: "evt_1".into(),
            tenant_id: tenant,
            effect: "first".into(),
            processed_at: Utc::now(),
        };
        repo.mark_processed(&original).await.unwrap();

        let replay = ProcessedEvent {
            effect: "second".into(),
            ..original.clone()
        };
        repo.mark_processed(&replay).await.unwrap();

        let history = repo.list_by_tenant(tenant, 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].effect, "first");
    }
}
