//! Loyalty accrual server
//!
//! Reconciles uploaded orders with the external accrual service and credits
//! user balances.

mod config;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::{ConfigLoader, Overrides};
use loyalty_core::processors::Pipeline;
use loyalty_core::stores::PgStore;
use loyalty_sdk::client::AccrualClient;
use server::{build_router, run_server};
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Loyalty points accrual service
#[derive(Parser, Debug)]
#[command(name = "loyalty-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Address and port to listen on (e.g. localhost:8081)
    #[arg(short = 'a', long = "listen", env = "RUN_ADDRESS")]
    listen: Option<String>,

    /// PostgreSQL connection URI
    #[arg(short = 'd', long = "database-uri", env = "DATABASE_URI")]
    database_uri: Option<String>,

    /// Accrual system address (e.g. http://localhost:8080)
    #[arg(short = 'r', long = "accrual-address", env = "ACCRUAL_SYSTEM_ADDRESS")]
    accrual_address: Option<String>,

    /// Optional TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();

    tracing::info!("Starting loyalty-server v{}", env!("CARGO_PKG_VERSION"));

    let config_loader = ConfigLoader::new(
        args.config.as_deref(),
        Overrides {
            listen: args.listen,
            database_uri: args.database_uri,
            accrual_address: args.accrual_address,
        },
    );
    let config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;

    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_uri)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    if args.migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&db_pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;
        tracing::info!("Migrations completed successfully");
    }

    let store = Arc::new(PgStore::new(db_pool.clone(), config.pipeline.retry.clone()));
    let accrual = Arc::new(AccrualClient::new(
        config.accrual_url.clone(),
        config.pipeline.accrual.request_timeout,
    ));
    tracing::info!(accrual = %config.accrual_url, "Using accrual service");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let pipeline = Pipeline::spawn(
        &config.pipeline,
        store.clone(),
        store,
        accrual,
        shutdown_rx,
    );

    let router = build_router(AppState::new(db_pool.clone()));

    tracing::info!("Starting HTTP server on {}", config.listen);
    let result = run_server(router, &config.listen).await;

    // Stop the workers before the pool goes away
    let _ = shutdown_tx.send(true);
    pipeline.join().await;

    tracing::info!("Closing database connections...");
    db_pool.close().await;
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
