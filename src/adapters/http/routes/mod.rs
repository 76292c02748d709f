pub mod billing_webhooks;
pub mod entitlements;

use axum::Router;

use crate::adapters::http::app_state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/billing", billing_webhooks::router())
        .nest("/entitlements", entitlements::router())
}
