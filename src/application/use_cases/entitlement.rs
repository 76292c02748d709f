//! Read path for entitlements: every request-path feature gate resolves a
//! tenant's document through here. Reads never trigger reconciliation.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::app_error::AppResult;
use crate::application::ports::entitlement_store::EntitlementStore;
use crate::application::ports::processed_events::ProcessedEventRepo;
use crate::application::tier_catalog;
use crate::domain::entities::entitlement::{EntitlementStatus, TenantEntitlement};
use crate::domain::entities::processed_event::ProcessedEvent;
use crate::domain::entities::tier::Tier;

/// Fetch a tenant's entitlement, creating the default free-tier document on
/// first authenticated access. Shared by every use case that reads state.
pub(crate) async fn load_or_create(
    store: &Arc<dyn EntitlementStore>,
    tenant_id: Uuid,
) -> AppResult<TenantEntitlement> {
    if let Some(doc) = store.get(tenant_id).await? {
        return Ok(doc);
    }
    debug!(tenant_id = %tenant_id, "creating default free entitlement");
    let default = tier_catalog::free_entitlement(tenant_id, Utc::now());
    store.create_default(&default).await
}

/// Compact entitlement snapshot for the UI: drives feature gates, the quota
/// meter, and the account-status banner.
#[derive(Debug, Clone, Serialize)]
pub struct EntitlementClaims {
    pub tenant_id: Uuid,
    pub tier: Tier,
    pub status: EntitlementStatus,
    pub period_end: Option<i64>,
    pub cancel_at_period_end: bool,
    pub quotas: BTreeMap<String, QuotaClaims>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuotaClaims {
    pub limit: i64,
    pub used: i64,
    pub remaining: i64,
}

impl EntitlementClaims {
    pub fn from_entitlement(doc: &TenantEntitlement) -> Self {
        Self {
            tenant_id: doc.tenant_id,
            tier: doc.tier,
            status: doc.status,
            period_end: doc.period_end.map(|dt| dt.timestamp()),
            cancel_at_period_end: doc.cancel_at_period_end,
            quotas: doc
                .quotas
                .iter()
                .map(|(name, q)| {
                    (
                        name.clone(),
                        QuotaClaims {
                            limit: q.limit,
                            used: q.used,
                            remaining: q.remaining(),
                        },
                    )
                })
                .collect(),
        }
    }
}

#[derive(Clone)]
pub struct EntitlementUseCases {
    store: Arc<dyn EntitlementStore>,
    processed: Arc<dyn ProcessedEventRepo>,
}

impl EntitlementUseCases {
    pub fn new(
        store: Arc<dyn EntitlementStore>,
        processed: Arc<dyn ProcessedEventRepo>,
    ) -> Self {
        Self { store, processed }
    }

    pub async fn get_entitlement(&self, tenant_id: Uuid) -> AppResult<TenantEntitlement> {
        load_or_create(&self.store, tenant_id).await
    }

    pub async fn get_claims(&self, tenant_id: Uuid) -> AppResult<EntitlementClaims> {
        let doc = self.get_entitlement(tenant_id).await?;
        Ok(EntitlementClaims::from_entitlement(&doc))
    }

    /// Reconciliation audit trail for a tenant, newest first.
    pub async fn get_history(
        &self,
        tenant_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<ProcessedEvent>> {
        self.processed.list_by_tenant(tenant_id, limit).await
    }
}
