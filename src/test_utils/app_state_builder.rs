//! Test app state builder for HTTP-level integration testing.
//!
//! Builds a minimal [`AppState`] wired to the in-memory mocks so route tests
//! run without a database.

use std::sync::Arc;

use axum::http::HeaderValue;
use secrecy::SecretString;

use crate::{
    adapters::http::app_state::AppState,
    application::ports::{
        entitlement_store::EntitlementStore, processed_events::ProcessedEventRepo,
    },
    application::use_cases::{
        entitlement::EntitlementUseCases, quota::QuotaEnforcer,
        reconciliation::ReconciliationEngine,
    },
    infra::config::AppConfig,
    test_utils::mocks::{InMemoryEntitlementStore, InMemoryProcessedEventRepo},
};

pub const TEST_WEBHOOK_SECRET: &str = "whsec_test_secret";

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<InMemoryEntitlementStore>,
    pub processed: Arc<InMemoryProcessedEventRepo>,
}

pub fn test_app() -> TestApp {
    let config = AppConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        database_url: "postgres://unused".to_string(),
        cors_origin: HeaderValue::from_static("http://localhost:3000"),
        webhook_secret: SecretString::new(TEST_WEBHOOK_SECRET.to_string().into()),
        event_retention_days: 90,
        retention_sweep_secs: 3_600,
    };

    let store = Arc::new(InMemoryEntitlementStore::new());
    let processed = Arc::new(InMemoryProcessedEventRepo::new());

    let store_arc = store.clone() as Arc<dyn EntitlementStore>;
    let processed_arc = processed.clone() as Arc<dyn ProcessedEventRepo>;

    let engine = ReconciliationEngine::new(store_arc.clone(), processed_arc.clone());
    let quota = QuotaEnforcer::new(store_arc.clone());
    let entitlements = EntitlementUseCases::new(store_arc, processed_arc.clone());

    TestApp {
        state: AppState {
            config: Arc::new(config),
            engine: Arc::new(engine),
            quota: Arc::new(quota),
            entitlements: Arc::new(entitlements),
            processed_events: processed_arc,
        },
        store,
        processed,
    }
}
