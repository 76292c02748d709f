//! Periodic garbage collection of the processed-event ledger.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::interval;
use tracing::{error, info};

use crate::app_error::AppResult;
use crate::application::ports::processed_events::ProcessedEventRepo;

/// The provider's maximum redelivery window. Entries younger than this must
/// never be purged: losing one would let a redelivered event apply twice.
pub const PROVIDER_REDELIVERY_WINDOW_DAYS: i64 = 30;

/// Delete processed-event records older than the retention window. The
/// effective window never drops below the provider's redelivery window,
/// whatever the configuration says.
pub async fn purge_expired(
    processed: &Arc<dyn ProcessedEventRepo>,
    retention_days: i64,
) -> AppResult<u64> {
    let effective_days = retention_days.max(PROVIDER_REDELIVERY_WINDOW_DAYS);
    let cutoff = Utc::now() - chrono::Duration::days(effective_days);
    processed.purge_older_than(cutoff).await
}

pub async fn run_retention_sweep_loop(
    processed: Arc<dyn ProcessedEventRepo>,
    retention_days: i64,
    sweep_secs: u64,
) {
    let mut ticker = interval(Duration::from_secs(sweep_secs));

    info!(
        retention_days,
        sweep_secs, "Processed-event retention sweep started"
    );

    loop {
        ticker.tick().await;

        match purge_expired(&processed, retention_days).await {
            Ok(0) => {}
            Ok(purged) => {
                info!(purged, "Purged expired processed-event records");
            }
            Err(e) => {
                error!(error = ?e, "Retention sweep failed, will retry on next tick");
            }
        }
    }
}
