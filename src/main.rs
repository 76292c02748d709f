use dotenvy::dotenv;
use tracing::info;

use ranklens_billing::infra::{
    app::create_app, retention::run_retention_sweep_loop, setup::init_app_state,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let app_state = init_app_state().await?;

    let bind_addr = app_state.config.bind_addr;

    let app = create_app(app_state.clone());

    // Spawn the processed-event retention sweep (after tracing is initialized)
    let processed = app_state.processed_events.clone();
    let retention_days = app_state.config.event_retention_days;
    let sweep_secs = app_state.config.retention_sweep_secs;
    tokio::spawn(async move {
        run_retention_sweep_loop(processed, retention_days, sweep_secs).await;
    });

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Billing core listening at {}", &listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
