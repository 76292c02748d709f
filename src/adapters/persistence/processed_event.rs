use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::ports::processed_events::ProcessedEventRepo,
    domain::entities::processed_event::ProcessedEvent,
};

fn row_to_event(row: &sqlx::postgres::PgRow) -> ProcessedEvent {
    ProcessedEvent {
        event_id: row.get("event_id"),
        tenant_id: row.get("tenant_id"),
        effect: row.get("effect"),
        processed_at: row.get("processed_at"),
    }
}

const SELECT_COLS: &str = "event_id, tenant_id, effect, processed_at";

#[async_trait]
impl ProcessedEventRepo for PostgresPersistence {
    async fn has_processed(&self, event_id: &str) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM processed_events WHERE event_id = $1)",
        )
        .bind(event_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(exists)
    }

    async fn mark_processed(&self, event: &ProcessedEvent) -> AppResult<()> {
        // Append-only: a replayed event id keeps its original record.
        sqlx::query(
            r#"
            INSERT INTO processed_events (event_id, tenant_id, effect, processed_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(&event.event_id)
        .bind(event.tenant_id)
        .bind(&event.effect)
        .bind(event.processed_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn list_by_tenant(
        &self,
        tenant_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<ProcessedEvent>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM processed_events WHERE tenant_id = $1 ORDER BY processed_at DESC LIMIT $2",
            SELECT_COLS
        ))
        .bind(tenant_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_event).collect())
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM processed_events WHERE processed_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(result.rows_affected())
    }
}
