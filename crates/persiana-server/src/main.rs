//! The `persiana` service binary.
//!
//! Wires the bridge together: loads the configuration, connects the bus
//! client (fatal when the broker is unreachable), starts the telemetry
//! router, and serves the HTTP surface until a shutdown signal arrives.

mod config;
mod directory;
mod responses;
mod routes;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use persiana_bridge::bus::{BusClient, CommandSink};
use persiana_bridge::gateway::CommandGateway;
use persiana_bridge::registry::Channels;
use persiana_bridge::router::TelemetryRouter;
use persiana_bridge::store::{MemoryStore, ReadingStore};

use tokio_util::sync::CancellationToken;

use tracing::{error, info, warn};

use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::directory::StaticDirectory;
use crate::routes::AppState;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for the shutdown signal: {e}");
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = match Config::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let directory = StaticDirectory::from_devices(&config.devices);
    if directory.is_empty() {
        warn!("No devices configured: every command will be rejected as unauthorized");
    } else {
        info!("Serving {} configured device(s)", directory.len());
    }

    let (bus, queue) = match BusClient::connect(
        &config.broker.address,
        config.broker.port,
        &config.broker.client_id,
    )
    .await
    {
        Ok(connected) => connected,
        Err(e) => {
            error!("Impossible to reach the broker at `{}:{}`: {e}", config.broker.address, config.broker.port);
            return ExitCode::FAILURE;
        }
    };
    info!("Connected to the broker at `{}:{}`", config.broker.address, config.broker.port);

    let channels = Arc::new(Channels::new());
    let store = Arc::new(MemoryStore::new());

    let router_token = CancellationToken::new();
    let router = TelemetryRouter::new(
        Arc::clone(&channels),
        Arc::clone(&store) as Arc<dyn ReadingStore>,
    );
    let router_task = tokio::spawn(router.run(queue, router_token.clone()));

    let gateway = Arc::new(CommandGateway::new(
        Arc::new(bus.publisher()) as Arc<dyn CommandSink>,
        Arc::clone(&channels),
        Arc::new(directory),
    ));

    let state = AppState {
        gateway,
        store,
        wait_timeout: config.wait_timeout(),
    };

    let listener = match tokio::net::TcpListener::bind(config.listen).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Impossible to listen on `{}`: {e}", config.listen);
            return ExitCode::FAILURE;
        }
    };
    info!("Serving on `{}`", config.listen);

    let served = axum::serve(listener, routes::app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // Stop the telemetry router and the bus client before exiting.
    router_token.cancel();
    if let Err(e) = router_task.await {
        error!("Failed to await the telemetry router task: {e}");
    }
    bus.shutdown().await;

    match served {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Server error: {e}");
            ExitCode::FAILURE
        }
    }
}
