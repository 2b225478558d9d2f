use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use dropcast_broker::{router, run_expiry_sweep, AppState, BrokerConfig, RoomManager};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = BrokerConfig::parse().validate();
    let bind_addr = config.bind_addr.clone();
    let room_expiry = config.room_expiry();
    let sweep_period = config.sweep_period();

    let room_manager = Arc::new(RoomManager::new());
    let state = Arc::new(AppState {
        room_manager: Arc::clone(&room_manager),
        config: Arc::new(config),
        started_at: Instant::now(),
    });

    tokio::spawn(run_expiry_sweep(room_manager, room_expiry, sweep_period));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(%bind_addr, "dropcast-broker listening");
    axum::serve(listener, router(state)).await?;

    Ok(())
}
