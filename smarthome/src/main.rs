mod config;
mod db;
mod errors;
mod metrics;
mod model;
mod rest;
mod store;
mod validate;

use axum::Router;
use config::Config;
use db::PgStore;
use std::sync::Arc;
use store::DeviceStore;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("smarthome=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    info!("Starting smarthome service");
    info!("Sensor API: {}", config.sensor_addr);
    info!("Device API: {}", config.device_addr);
    info!("Database: {}", config.database_label());

    metrics::init_metrics()?;

    // Schema is created here, before any listener is bound
    let pool = match db::make_pool(config.database.clone(), config.max_connections).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };
    let store = Arc::new(PgStore::new(pool));

    if !config.device_seed.is_empty() {
        let inserted = store.seed_devices(&config.device_seed).await?;
        info!(
            "Provisioned {} new device(s) from {} configured",
            inserted,
            config.device_seed.len()
        );
    }

    let mut servers = JoinSet::new();
    if config.sensor_addr == config.device_addr {
        let app = rest::create_combined_router(store);
        spawn_server(&mut servers, &config.sensor_addr, "Sensor+device", app).await?;
    } else {
        let sensor_app = rest::create_sensor_router(Arc::clone(&store));
        let device_app = rest::create_device_router(store);
        spawn_server(&mut servers, &config.sensor_addr, "Sensor", sensor_app).await?;
        spawn_server(&mut servers, &config.device_addr, "Device", device_app).await?;
    }

    tokio::select! {
        _ = servers.join_next() => {
            error!("HTTP server terminated");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Shutting down");
    Ok(())
}

async fn spawn_server(
    servers: &mut JoinSet<()>,
    addr: &str,
    label: &'static str,
    app: Router,
) -> errors::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("{} API listening on {}", label, addr);

    servers.spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("{} HTTP server error: {}", label, e);
        }
    });
    Ok(())
}
