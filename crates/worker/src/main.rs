use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scriptmark_vision::{Invoker, VisionApi};
use scriptmark_worker::config::WorkerConfig;
use scriptmark_worker::{reaper, retention, runner::WorkerRunner};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scriptmark_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = WorkerConfig::from_env();
    tracing::info!(
        vision_url = %config.vision.base_url,
        model = %config.vision.model,
        "Loaded worker configuration",
    );

    // --- Database ---
    let pool = scriptmark_db::create_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    scriptmark_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database connection pool created");

    // --- Vision invoker ---
    let invoker = Invoker::new(VisionApi::new(config.vision.clone()), config.retry.clone());

    // --- Background loops ---
    let cancel = CancellationToken::new();

    let reaper_handle = tokio::spawn(reaper::run(pool.clone(), cancel.clone()));
    let retention_handle = tokio::spawn(retention::run(pool.clone(), cancel.clone()));

    let runner = Arc::new(WorkerRunner::new(
        pool,
        invoker,
        config.poll_interval,
        config.lease,
        config.heartbeat_interval,
    ));
    let mut runner_handles = Vec::with_capacity(config.concurrency);
    for _ in 0..config.concurrency {
        let runner = Arc::clone(&runner);
        let cancel = cancel.clone();
        runner_handles.push(tokio::spawn(async move {
            runner.run(cancel).await;
        }));
    }
    tracing::info!(concurrency = config.concurrency, "Worker runners started");

    shutdown_signal().await;
    cancel.cancel();

    for handle in runner_handles {
        let _ = tokio::time::timeout(Duration::from_secs(30), handle).await;
    }
    let _ = tokio::time::timeout(Duration::from_secs(5), reaper_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), retention_handle).await;
    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the worker
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
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
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
