use biometric_ingest::db::schema;
use biometric_ingest::server::config::ServerConfig;
use biometric_ingest::server::pull_scheduler::PullScheduler;
use biometric_ingest::terminal::UnavailableConnector;
use biometric_ingest::version::VERSION;
use biometric_ingest::web::{self, AppState};

use clap::Parser;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version = VERSION, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<String>,
}

fn init_logging(log_dir: &str) {
    // Log to a file: JSON format, daily rotation
    let file_appender = rolling::daily(log_dir, "biometric-ingest.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();

    // Log to stdout: human-readable format
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sea_orm=warn,sqlx::query=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal.");
    }
    info!("Shutdown signal received.");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    // Configuration comes first: it names the log directory.
    let server_config = match ServerConfig::load(args.config.as_deref()) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("Failed to load server configuration: {e}");
            return Err(e.into());
        }
    };

    init_logging(&server_config.log_dir);
    info!(
        version = VERSION,
        device_timezone = %server_config.device_timezone,
        "Starting biometric ingestion server."
    );

    // --- Database Pool Setup ---
    let mut opt = ConnectOptions::new(server_config.database_url.clone());
    opt.max_connections(server_config.max_db_connections)
        .sqlx_logging(false);
    let db_pool: DatabaseConnection = Database::connect(opt).await.map_err(|e| {
        error!(error = %e, "Failed to create database connection.");
        e
    })?;
    schema::create_schema(&db_pool).await?;
    info!("Database schema ready.");

    // No vendor protocol driver ships with this server; pull, clock and
    // connection-test requests report a protocol failure until one is wired in.
    let connector = Arc::new(UnavailableConnector);
    let app_state = Arc::new(AppState::new(db_pool.clone(), server_config.clone(), connector));

    // --- Periodic Pull Task ---
    let pull_task = match server_config.pull_interval() {
        Some(every) => {
            let scheduler = Arc::new(PullScheduler::new(
                db_pool.clone(),
                app_state.synchronizer.clone(),
                server_config.clear_after_pull,
            ));
            Some(tokio::spawn(scheduler.run_periodic(every)))
        }
        None => {
            info!("Periodic terminal pull disabled.");
            None
        }
    };

    // --- Axum HTTP Server Setup ---
    let addr: SocketAddr = server_config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "HTTP server listening.");

    let app = web::create_axum_router(app_state);
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(Box::new)?;

    if let Some(task) = pull_task {
        task.abort();
    }
    if let Err(e) = db_pool.close().await {
        warn!(error = %e, "Database pool did not close cleanly.");
    }
    Ok(())
}
