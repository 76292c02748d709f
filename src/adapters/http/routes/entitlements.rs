//! Request-path entitlement surface: claims for the UI, feature gate
//! decisions, and metered quota consumption.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::adapters::http::app_state::AppState;
use crate::app_error::{AppError, AppResult};
use crate::application::use_cases::access;
use crate::application::use_cases::entitlement::EntitlementClaims;
use crate::domain::entities::feature::Feature;
use crate::domain::entities::processed_event::ProcessedEvent;

const DEFAULT_HISTORY_LIMIT: i64 = 50;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{tenant_id}", get(get_entitlement))
        .route("/{tenant_id}/features/{feature}", get(check_feature))
        .route("/{tenant_id}/quotas/{quota}/consume", post(consume_quota))
        .route("/{tenant_id}/events", get(list_events))
}

/// GET /api/entitlements/{tenant_id}
async fn get_entitlement(
    State(app_state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> AppResult<Json<EntitlementClaims>> {
    let claims = app_state.entitlements.get_claims(tenant_id).await?;
    Ok(Json(claims))
}

#[derive(Debug, Serialize)]
struct FeatureDecision {
    feature: Feature,
    allowed: bool,
}

/// GET /api/entitlements/{tenant_id}/features/{feature}
async fn check_feature(
    State(app_state): State<AppState>,
    Path((tenant_id, feature)): Path<(Uuid, String)>,
) -> AppResult<Json<FeatureDecision>> {
    let feature: Feature = feature
        .parse()
        .map_err(|_| AppError::InvalidInput(format!("unknown feature: {}", feature)))?;

    let entitlement = app_state.entitlements.get_entitlement(tenant_id).await?;
    Ok(Json(FeatureDecision {
        feature,
        allowed: access::can_access_feature(&entitlement, feature),
    }))
}

#[derive(Debug, Default, Deserialize)]
struct ConsumeRequest {
    amount: Option<i64>,
}

#[derive(Debug, Serialize)]
struct ConsumeResponse {
    allowed: bool,
    remaining: i64,
}

/// POST /api/entitlements/{tenant_id}/quotas/{quota}/consume
async fn consume_quota(
    State(app_state): State<AppState>,
    Path((tenant_id, quota)): Path<(Uuid, String)>,
    body: Option<Json<ConsumeRequest>>,
) -> AppResult<Json<ConsumeResponse>> {
    let amount = body.and_then(|Json(req)| req.amount).unwrap_or(1);
    let decision = app_state
        .quota
        .check_and_increment(tenant_id, &quota, amount)
        .await?;
    Ok(Json(ConsumeResponse {
        allowed: decision.is_allowed(),
        remaining: decision.remaining(),
    }))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<i64>,
}

/// GET /api/entitlements/{tenant_id}/events
async fn list_events(
    State(app_state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<Vec<ProcessedEvent>>> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, 500);
    let events = app_state.entitlements.get_history(tenant_id, limit).await?;
    Ok(Json(events))
}
