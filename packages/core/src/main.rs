use std::sync::Arc;

use clap::Parser;
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;

use appointme_scheduler::api::{self, AppState};
use appointme_scheduler::cli::Cli;
use appointme_scheduler::config::Config;
use appointme_scheduler::db;
use appointme_scheduler::error::AppError;
use appointme_scheduler::logging::init_logging;
use appointme_scheduler::metrics::AppMetrics;
use appointme_scheduler::repository::SqliteAppointmentStore;
use appointme_scheduler::scheduling::Scheduler;
use appointme_scheduler::store::AppointmentStore;

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_logging();

    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        tracing::error!("{}", err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let config = Config::from_env().map_err(AppError::Config)?.with_cli(&cli);
    tracing::info!("Starting {} ({:?}) with config: {:?}", config.app_name, config.app_env, config);

    let pool = db::create_pool_with(&config.database_url, config.db_max_connections).await?;
    let store: Arc<dyn AppointmentStore> = Arc::new(SqliteAppointmentStore::new(pool));
    let scheduler = Arc::new(Scheduler::new(store));
    let metrics = Arc::new(AppMetrics::new()?);

    let app = api::create_router(AppState::new(scheduler, metrics)).layer(CorsLayer::permissive());

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received. Draining connections.");
}
