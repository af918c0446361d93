//! Task queue service entry point.
//!
//! Infrastructure, not a feature: exposes only what is needed to run the
//! service as a standalone binary — `serve` (load config, run migrations,
//! bind the HTTP router) and `migrate` (run pending migrations and exit).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio::signal;

use taskqueue::api::{build_router, AppState};
use taskqueue::domain::models::Config;
use taskqueue::domain::ports::EndpointRepository;
use taskqueue::infrastructure::config::ConfigLoader;
use taskqueue::infrastructure::database::{
    DatabaseConnection, SqliteEndpointRepository, SqliteTaskHistoryRepository, SqliteTaskRepository,
    SqliteTaskTypeRepository,
};
use taskqueue::infrastructure::logging::{LogConfig, LogFormat, LoggerImpl, RotationPolicy};
use taskqueue::services::{LifecycleEngine, TaskRegistry};

#[derive(Parser)]
#[command(name = "taskqueued")]
#[command(about = "Durable, multi-worker task queue service", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load configuration, apply pending migrations, and serve the HTTP API.
    Serve {
        /// Path to a YAML config file. Defaults to `queue.yaml` in the
        /// working directory plus `TASKQUEUE_`-prefixed env vars.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Apply pending database migrations and exit.
    Migrate {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => serve(config).await,
        Commands::Migrate { config } => migrate(config).await,
    }
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
    .context("failed to load configuration")
}

async fn migrate(config: Option<PathBuf>) -> Result<()> {
    let config = load_config(config)?;
    let database_url = format!("sqlite:{}", config.database.path);
    let db = DatabaseConnection::connect(&database_url, config.database.max_connections)
        .await
        .context("failed to connect to database")?;
    println!("migrations applied against {}", config.database.path);
    drop(db);
    Ok(())
}

async fn serve(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;

    let _logger_guard = LoggerImpl::init(&LogConfig {
        level: config.logging.level.clone(),
        format: if config.logging.format == "pretty" { LogFormat::Pretty } else { LogFormat::Json },
        log_dir: None,
        enable_stdout: true,
        rotation: RotationPolicy::Daily,
        retention_days: config.logging.retention_days,
    })
    .context("failed to initialize logging")?;

    let database_url = format!("sqlite:{}", config.database.path);
    let db = DatabaseConnection::connect(&database_url, config.database.max_connections)
        .await
        .context("failed to connect to database")?;
    let pool = db.pool().clone();

    let tasks = Arc::new(SqliteTaskRepository::new(pool.clone()));
    let task_types = Arc::new(SqliteTaskTypeRepository::new(pool.clone()));
    let history = Arc::new(SqliteTaskHistoryRepository::new(pool.clone()));
    let endpoints: Arc<dyn EndpointRepository> = Arc::new(SqliteEndpointRepository::new(pool.clone()));

    let engine = Arc::new(LifecycleEngine::new(
        tasks,
        task_types.clone(),
        history,
        config.queue.max_task_attempts,
        config.queue.claim_timeout_secs,
        config.queue.history_enabled,
    ));
    let registry = Arc::new(TaskRegistry::new(task_types));

    spawn_reclaim_sweep(engine.clone(), config.queue.claim_timeout_secs);

    let state = AppState { engine, registry, endpoints: endpoints.clone(), api_key: Arc::new(config.server.api_key.clone()) };
    let router = build_router(endpoints, state, config.queue.max_request_size)
        .await
        .map_err(|err| anyhow::anyhow!("failed to build router: {err}"))?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await.with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "task queue service listening");

    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await.context("server error")?;
    Ok(())
}

/// Runs the `ReclaimExpired` sweep (spec §5) on an interval so tasks
/// abandoned by dead workers recover without an operator invoking it
/// manually. Purely a periodic caller of the same engine operation tests
/// invoke synchronously.
fn spawn_reclaim_sweep(engine: Arc<LifecycleEngine>, claim_timeout_secs: i64) {
    let interval_secs = (claim_timeout_secs / 2).clamp(5, 300) as u64;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            match engine.reclaim_expired().await {
                Ok(0) => {}
                Ok(count) => tracing::info!(count, "reclaimed expired task claims"),
                Err(err) => tracing::error!(error = %err, "reclaim sweep failed"),
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
