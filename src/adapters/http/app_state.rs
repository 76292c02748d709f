use std::sync::Arc;

use crate::{
    application::ports::processed_events::ProcessedEventRepo,
    application::use_cases::{
        entitlement::EntitlementUseCases, quota::QuotaEnforcer,
        reconciliation::ReconciliationEngine,
    },
    infra::config::AppConfig,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub engine: Arc<ReconciliationEngine>,
    pub quota: Arc<QuotaEnforcer>,
    pub entitlements: Arc<EntitlementUseCases>,
    /// Held here so the retention sweep can be spawned from main.
    pub processed_events: Arc<dyn ProcessedEventRepo>,
}
