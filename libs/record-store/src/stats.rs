use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use bench_api::{
    AggregateSnapshot, DatabaseStats, KindAverages, OperationKind, OverflowUsage, StoreBackend,
    StoreError,
};

const NANOS_PER_MS: f64 = 1_000_000.0;

// ═══════════════════════════════════════════════════════════════
//  StatsAggregator
// ═══════════════════════════════════════════════════════════════

/// Stateless query-and-reduce over the operation log and the engine's
/// own size accounting. Nothing is cached: every call hits the backend.
#[derive(Clone)]
pub struct StatsAggregator {
    backend: Arc<dyn StoreBackend>,
}

impl StatsAggregator {
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self { backend }
    }

    /// Средние по каждому типу операции. Типы без записей в логе
    /// в результат не попадают.
    pub async fn compute_averages(&self) -> Result<BTreeMap<OperationKind, KindAverages>, StoreError> {
        let rows = self.backend.kind_aggregates().await?;
        Ok(rows
            .into_iter()
            .filter(|row| row.samples > 0)
            .map(|row| {
                (
                    row.kind,
                    KindAverages {
                        samples: row.samples,
                        avg_duration_ms: row.avg_duration_ns / NANOS_PER_MS,
                        avg_payload_bytes: row.avg_payload_bytes,
                    },
                )
            })
            .collect())
    }

    pub async fn overflow_snapshot(&self) -> Result<Vec<OverflowUsage>, StoreError> {
        self.backend.overflow_usage().await
    }

    pub async fn database_stats(&self) -> Result<Vec<DatabaseStats>, StoreError> {
        self.backend.database_stats().await
    }

    /// Полный снимок. Ошибка любого подзапроса — ошибка всего снимка,
    /// частично заполненный снимок не возвращается.
    pub async fn snapshot(&self) -> Result<AggregateSnapshot, StoreError> {
        let (per_kind, overflow, database) = tokio::try_join!(
            self.compute_averages(),
            self.overflow_snapshot(),
            self.database_stats(),
        )?;
        Ok(AggregateSnapshot { per_kind, overflow, database })
    }
}

// ═══════════════════════════════════════════════════════════════
//  Periodic stats logger
// ═══════════════════════════════════════════════════════════════

/// Периодически пишет снимок статистики в лог, пока не отменён `token`.
pub fn spawn_stats_logger(
    stats: StatsAggregator,
    every: Duration,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // первый tick срабатывает сразу — пропускаем
        interval.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = interval.tick() => {
                    match stats.snapshot().await {
                        Ok(snap) => log_snapshot(&snap),
                        Err(e) => tracing::warn!(error = ?e, "stats snapshot failed"),
                    }
                }
            }
        }
        tracing::debug!("stats logger stopped");
    })
}

fn log_snapshot(snap: &AggregateSnapshot) {
    for (kind, avg) in &snap.per_kind {
        tracing::info!(
            kind = %kind,
            samples = avg.samples,
            avg_ms = format_args!("{:.3}", avg.avg_duration_ms),
            avg_bytes = ?avg.avg_payload_bytes,
            "operation averages"
        );
    }
    if snap.overflow.is_empty() {
        tracing::info!("no out-of-line storage yet");
    }
    for unit in &snap.overflow {
        tracing::info!(
            unit = %unit.unit_name,
            bytes = unit.overflow_bytes,
            size = %unit.human_readable_size,
            "overflow storage"
        );
    }
    for db in &snap.database {
        tracing::info!(
            db = db.datname.as_deref().unwrap_or("-"),
            backends = db.numbackends,
            commits = db.xact_commit,
            rollbacks = db.xact_rollback,
            blks_read = db.blks_read,
            blks_hit = db.blks_hit,
            "database stats"
        );
    }
}
