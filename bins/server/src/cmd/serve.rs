use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use bench_api::StoreBackend;
use record_store::{RecordStore, StatsAggregator, spawn_stats_logger};
use storage_memory::MemoryBackend;
use storage_postgres::PostgresBackend;

use crate::config::{BackendKind, ServeArgs, ServerConfig};
use crate::error::ServerError;

pub async fn run(args: ServeArgs) -> Result<(), ServerError> {
    tracing::info!("jsonb-server starting");

    // --- Load config ---
    let config = ServerConfig::resolve(&args)?;
    tracing::info!(config = %args.config, backend = ?config.backend, "loaded config");

    // --- Storage engine ---
    let backend: Arc<dyn StoreBackend> = match config.backend {
        BackendKind::Memory => Arc::new(MemoryBackend::new()),
        BackendKind::Postgres => {
            let url = config.database_url.as_deref().ok_or_else(|| ServerError::Config {
                context: "validate",
                detail: "backend = \"postgres\" requires database_url or DATABASE_URL".into(),
            })?;
            Arc::new(PostgresBackend::connect(url, config.pool_size)?)
        }
    };
    backend.init().await?;
    tracing::info!(pool_size = config.pool_size, "storage ready");

    let store = RecordStore::new(backend.clone());
    let stats = StatsAggregator::new(backend);

    // --- CancellationToken for graceful shutdown ---
    let token = CancellationToken::new();

    let stats_handle = if config.stats_log_interval_secs > 0 {
        Some(spawn_stats_logger(
            stats.clone(),
            Duration::from_secs(config.stats_log_interval_secs),
            token.clone(),
        ))
    } else {
        None
    };

    // --- API server ---
    let api_port = config.api_port;
    let api_token = token.clone();
    let api_handle = tokio::spawn(async move {
        if let Err(e) = crud_api_server::run(api_port, store, stats, api_token).await {
            tracing::error!(error = %e, "api server error");
        }
    });

    tracing::info!(port = api_port, "api server listening");
    tracing::info!("server ready");

    // --- Ожидание Ctrl+C ---
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down...");

    token.cancel();

    // Drain: in-flight requests get up to 5s
    let handles: Vec<_> = std::iter::once(api_handle).chain(stats_handle).collect();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    for h in handles {
        let abort = h.abort_handle();
        if tokio::time::timeout_at(deadline, h).await.is_err() {
            tracing::warn!("task did not stop in time, aborting");
            abort.abort();
        }
    }

    tracing::info!("shutdown complete");
    Ok(())
}
