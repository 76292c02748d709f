use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, parse_json_with_fallback},
    app_error::{AppError, AppResult},
    application::ports::entitlement_store::{CasOutcome, EntitlementStore},
    domain::entities::entitlement::{
        EntitlementStatus, PaymentOutcome, QuotaState, TenantEntitlement,
    },
    domain::entities::tier::Tier,
};

fn row_to_entitlement(row: &sqlx::postgres::PgRow) -> TenantEntitlement {
    let tenant_id: Uuid = row.get("tenant_id");
    let quotas: BTreeMap<String, QuotaState> = parse_json_with_fallback(
        &row.get::<serde_json::Value, _>("quotas"),
        "quotas",
        "tenant_entitlement",
        &tenant_id.to_string(),
    );
    TenantEntitlement {
        tenant_id,
        tier: row.get::<Tier, _>("tier"),
        status: row.get::<EntitlementStatus, _>("status"),
        billing_ref: row.get("billing_ref"),
        period_end: row.get("period_end"),
        cancel_at_period_end: row.get("cancel_at_period_end"),
        quotas,
        last_payment_status: row.get::<Option<PaymentOutcome>, _>("last_payment_status"),
        last_payment_at: row.get("last_payment_at"),
        last_event_seq: row.get("last_event_seq"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = r#"
    tenant_id, tier, status, billing_ref, period_end, cancel_at_period_end,
    quotas, last_payment_status, last_payment_at, last_event_seq, updated_at
"#;

fn quotas_json(quotas: &BTreeMap<String, QuotaState>) -> AppResult<serde_json::Value> {
    serde_json::to_value(quotas)
        .map_err(|e| AppError::Internal(format!("failed to serialize quotas: {}", e)))
}

#[async_trait]
impl EntitlementStore for PostgresPersistence {
    async fn get(&self, tenant_id: Uuid) -> AppResult<Option<TenantEntitlement>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM tenant_entitlements WHERE tenant_id = $1",
            SELECT_COLS
        ))
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_entitlement))
    }

    async fn create_default(
        &self,
        entitlement: &TenantEntitlement,
    ) -> AppResult<TenantEntitlement> {
        // First writer wins; a racing creator falls through to the re-read.
        sqlx::query(
            r#"
            INSERT INTO tenant_entitlements
                (tenant_id, tier, status, billing_ref, period_end, cancel_at_period_end,
                 quotas, last_payment_status, last_payment_at, last_event_seq, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (tenant_id) DO NOTHING
            "#,
        )
        .bind(entitlement.tenant_id)
        .bind(entitlement.tier)
        .bind(entitlement.status)
        .bind(&entitlement.billing_ref)
        .bind(entitlement.period_end)
        .bind(entitlement.cancel_at_period_end)
        .bind(quotas_json(&entitlement.quotas)?)
        .bind(entitlement.last_payment_status)
        .bind(entitlement.last_payment_at)
        .bind(entitlement.last_event_seq)
        .bind(entitlement.updated_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        self.get(entitlement.tenant_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    async fn compare_and_swap(
        &self,
        expected_updated_at: DateTime<Utc>,
        next: &TenantEntitlement,
    ) -> AppResult<CasOutcome> {
        let result = sqlx::query(
            r#"
            UPDATE tenant_entitlements SET
                tier = $3,
                status = $4,
                billing_ref = $5,
                period_end = $6,
                cancel_at_period_end = $7,
                quotas = $8,
                last_payment_status = $9,
                last_payment_at = $10,
                last_event_seq = $11,
                updated_at = $12
            WHERE tenant_id = $1 AND updated_at = $2
            "#,
        )
        .bind(next.tenant_id)
        .bind(expected_updated_at)
        .bind(next.tier)
        .bind(next.status)
        .bind(&next.billing_ref)
        .bind(next.period_end)
        .bind(next.cancel_at_period_end)
        .bind(quotas_json(&next.quotas)?)
        .bind(next.last_payment_status)
        .bind(next.last_payment_at)
        .bind(next.last_event_seq)
        .bind(next.updated_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        if result.rows_affected() == 1 {
            Ok(CasOutcome::Stored)
        } else {
            Ok(CasOutcome::Conflict)
        }
    }
}
