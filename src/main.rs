//! Archlens Server: analysis pipeline core
//!
//! Main entry point that wires the broker, the real-time engine, the
//! scheduler and the HTTP surface together and starts the server.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

use archlens_api::AppState;
use archlens_auth::JwtDecoder;
use archlens_broker::BrokerManager;
use archlens_core::config::AppConfig;
use archlens_core::error::AppError;
use archlens_database::DatabasePool;
use archlens_database::repositories::{DiagramRepository, JobRepository, QuotaRepository};
use archlens_realtime::{ProgressSubscriber, RealtimeEngine};
use archlens_worker::jobs::{CleanupJob, QuotaResetJob};
use archlens_worker::{JobDispatcher, JobQueue, Scheduler};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    }
}

/// Load configuration from files and environment.
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("ARCHLENS_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting Archlens pipeline v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Database connection ──────────────────────────────
    let db = DatabasePool::connect(&config.database).await?;

    // ── Step 2: Message broker ───────────────────────────────────
    tracing::info!(provider = %config.broker.provider, "Initializing broker...");
    let broker = BrokerManager::new(&config.broker).await?;
    tracing::info!("Broker initialized");

    // ── Step 3: Job queue + dispatcher ───────────────────────────
    let job_queue = Arc::new(JobQueue::new(broker.queue(), &config.queue));
    let dispatcher = Arc::new(JobDispatcher::new(
        Arc::clone(&job_queue),
        Arc::new(JobRepository::new(db.clone_pool())),
    ));

    // ── Step 4: Realtime engine ──────────────────────────────────
    tracing::info!("Initializing realtime engine...");
    let subscriber = ProgressSubscriber::new(
        broker.pubsub(),
        config.broker.progress_channel.clone(),
        Duration::from_secs(config.broker.redis.resubscribe_delay_seconds),
    );
    let realtime = RealtimeEngine::new(&config.realtime, subscriber);
    realtime.start();

    // ── Step 5: Scheduler ────────────────────────────────────────
    let scheduler = Arc::new(Scheduler::new(
        &config.scheduler,
        QuotaResetJob::new(Arc::new(QuotaRepository::new(db.clone_pool()))),
        CleanupJob::new(
            &config.scheduler,
            Arc::new(DiagramRepository::new(db.clone_pool())),
        ),
    ));
    scheduler.start().await?;

    // ── Step 6: Build and start HTTP server ──────────────────────
    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let app_state = AppState {
        config: Arc::new(config.clone()),
        jwt_decoder: Arc::new(JwtDecoder::new(&config.auth)),
        realtime: realtime.clone(),
        job_queue,
        dispatcher,
        scheduler: Arc::clone(&scheduler),
        database: Arc::new(db.clone()),
    };
    let app = archlens_api::build_app(app_state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;

    tracing::info!("Archlens server listening on {addr}");

    // ── Step 7: Graceful shutdown ────────────────────────────────
    let engine = realtime.clone();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, starting graceful shutdown...");
        // Open sockets keep the server from draining until they are closed.
        engine.shutdown(grace).await;
    });

    server
        .await
        .map_err(|e| AppError::internal(format!("Server error: {e}")))?;

    // ── Step 8: Stop background tasks ────────────────────────────
    if let Err(e) = scheduler.stop().await {
        tracing::error!("Scheduler shutdown failed: {e}");
    }
    db.close().await;

    tracing::info!("Archlens server shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
