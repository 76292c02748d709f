use std::fs::File;
use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    adapters::{http::app_state::AppState, persistence::PostgresPersistence},
    application::ports::{
        entitlement_store::EntitlementStore, processed_events::ProcessedEventRepo,
    },
    application::use_cases::{
        entitlement::EntitlementUseCases, quota::QuotaEnforcer,
        reconciliation::ReconciliationEngine,
    },
    infra::{config::AppConfig, db::init_db},
};

pub async fn init_app_state() -> anyhow::Result<AppState> {
    init_tracing();

    let config = AppConfig::from_env();

    let pool = init_db(&config.database_url).await?;
    let persistence = Arc::new(PostgresPersistence::new(pool));

    let store_arc = persistence.clone() as Arc<dyn EntitlementStore>;
    let processed_arc = persistence.clone() as Arc<dyn ProcessedEventRepo>;

    let engine = ReconciliationEngine::new(store_arc.clone(), processed_arc.clone());
    let quota = QuotaEnforcer::new(store_arc.clone());
    let entitlements = EntitlementUseCases::new(store_arc, processed_arc.clone());

    Ok(AppState {
        config: Arc::new(config),
        engine: Arc::new(engine),
        quota: Arc::new(quota),
        entitlements: Arc::new(entitlements),
        processed_events: processed_arc,
    })
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ranklens_billing=debug,tower_http=debug".into());

    // Console (pretty logs)
    let console_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .pretty();

    // File (structured JSON logs)
    let file = File::create("app.log").expect("cannot create log file");
    let json_layer = fmt::layer()
        .json()
        .with_writer(file)
        .with_current_span(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();
}
