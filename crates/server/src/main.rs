//! Order dispatch server - main entry point
//!
//! Takes orders from the web storefront, the voice line and text messages,
//! broadcasts them to drivers and tracks claims and deliveries.

mod api;
mod startup;
mod state;

use std::{path::PathBuf, sync::Arc};

use axum::Router;
use clap::Parser;
use order_dispatch_config::{validate_config, AppConfig, ConfigLoader, ENV_PREFIX};
use order_dispatch_metrics::{init_tracing, metrics_routes, MetricsCollector};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::state::{AppState, AppStateRef};

/// Order dispatch server CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML, YAML or JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured listen port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = load_config(&args)?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    validate_config(&config)?;

    let metrics = Arc::new(MetricsCollector::new());
    init_tracing(&config.server.log_level, config.server.log_json, metrics.clone())?;

    info!("Starting order dispatch server");
    info!("  Store: {:?}", config.store.backend);
    info!("  Notifier: {:?}", config.notifier.kind);
    info!("  Drivers: {}", config.drivers.len());

    let (store, deferred) = startup::build_store(&config.store);
    startup::spawn_store_init(config.store.clone(), deferred.clone());

    let notifier = startup::build_notifier(&config.notifier)?;
    let core = startup::build_core(&config, store, notifier)?;
    let state = Arc::new(AppState::new(core, metrics.clone(), deferred));

    let app = build_router(state, &config, metrics);

    let addr = config.server.bind_address();
    info!("Order dispatch server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// File plus environment when a file is given, environment alone otherwise
fn load_config(args: &Args) -> anyhow::Result<AppConfig> {
    let config = match &args.config {
        Some(path) => ConfigLoader::from_file_with_env(path, ENV_PREFIX)?,
        None => ConfigLoader::from_env()?,
    };
    Ok(config)
}

fn build_router(state: AppStateRef, config: &AppConfig, metrics: Arc<MetricsCollector>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = api::routes(state);
    if config.server.metrics_enabled {
        app = app.merge(metrics_routes(metrics));
    }

    app.layer(cors).layer(TraceLayer::new_for_http())
}
