//! Polls the server's `GET /stats` and archives every snapshot as
//! `<export_dir>/stats_<unix_ms>.json`.

mod error;

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use tokio_util::sync::CancellationToken;

use bench_api::{AggregateSnapshot, now_ms};

pub use error::MonitorError;

// ═══════════════════════════════════════════════════════════════
//  CLI args
// ═══════════════════════════════════════════════════════════════

#[derive(Args, Clone, Debug)]
pub struct MonitorArgs {
    /// Базовый URL сервера, напр. http://app:8080
    #[arg(long, env = "BASE_URL", default_value = "http://localhost:8080")]
    pub base_url: String,

    /// Каталог для stats_<unix_ms>.json
    #[arg(long, env = "EXPORT_DIR", default_value = "stats")]
    pub export_dir: PathBuf,

    /// Период опроса в секундах
    #[arg(long, env = "POLL_SECS", default_value_t = 10)]
    pub poll_secs: u64,

    /// Таймаут HTTP запроса в мс
    #[arg(long, default_value_t = 10_000)]
    pub timeout_ms: u64,
}

// ═══════════════════════════════════════════════════════════════
//  Monitor
// ═══════════════════════════════════════════════════════════════

pub struct Monitor {
    client: reqwest::Client,
    stats_url: String,
    export_dir: PathBuf,
    every: Duration,
}

impl Monitor {
    pub fn new(args: &MonitorArgs) -> Result<Self, MonitorError> {
        if args.poll_secs == 0 {
            return Err(MonitorError::Config("poll_secs must be > 0".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(args.timeout_ms))
            .build()
            .map_err(|e| MonitorError::Config(format!("http client: {e}")))?;

        Ok(Self {
            client,
            stats_url: format!("{}/stats", args.base_url.trim_end_matches('/')),
            export_dir: args.export_dir.clone(),
            every: Duration::from_secs(args.poll_secs),
        })
    }

    pub async fn fetch(&self) -> Result<AggregateSnapshot, MonitorError> {
        let fetch_err = |e: reqwest::Error| MonitorError::Fetch {
            url: self.stats_url.clone(),
            detail: e.to_string(),
        };
        self.client
            .get(&self.stats_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(fetch_err)?
            .json()
            .await
            .map_err(fetch_err)
    }

    /// Записать снимок в `stats_<unix_ms>.json`, вернуть путь файла.
    pub async fn export(&self, snapshot: &AggregateSnapshot) -> Result<PathBuf, MonitorError> {
        let path = snapshot_path(&self.export_dir, now_ms());
        let body = serde_json::to_vec_pretty(snapshot)?;
        tokio::fs::write(&path, body).await.map_err(|source| MonitorError::Export {
            path: path.display().to_string(),
            source,
        })?;
        Ok(path)
    }

    /// Опрос до отмены `token`. Ошибка одного опроса не останавливает цикл.
    pub async fn run(&self, token: CancellationToken) -> Result<(), MonitorError> {
        tokio::fs::create_dir_all(&self.export_dir)
            .await
            .map_err(|source| MonitorError::Export {
                path: self.export_dir.display().to_string(),
                source,
            })?;
        tracing::info!(
            url = %self.stats_url,
            export_dir = %self.export_dir.display(),
            every_s = self.every.as_secs(),
            "stats monitor started"
        );

        let mut interval = tokio::time::interval(self.every);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(e) = self.poll_once().await {
                        tracing::warn!(error = %e, "stats poll failed");
                    }
                }
            }
        }

        tracing::info!("stats monitor stopped");
        Ok(())
    }

    async fn poll_once(&self) -> Result<(), MonitorError> {
        let snapshot = self.fetch().await?;
        let path = self.export(&snapshot).await?;

        for unit in &snapshot.overflow {
            tracing::info!(
                unit = %unit.unit_name,
                bytes = unit.overflow_bytes,
                size = %unit.human_readable_size,
                "overflow storage"
            );
        }
        tracing::debug!(path = %path.display(), kinds = snapshot.per_kind.len(), "snapshot exported");
        Ok(())
    }
}

pub fn snapshot_path(dir: &Path, unix_ms: i64) -> PathBuf {
    dir.join(format!("stats_{unix_ms}.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_carries_timestamp() {
        let p = snapshot_path(Path::new("/tmp/out"), 1_700_000_000_123);
        assert_eq!(p, PathBuf::from("/tmp/out/stats_1700000000123.json"));
    }

    #[test]
    fn zero_poll_period_is_rejected() {
        let args = MonitorArgs {
            base_url: "http://x".into(),
            export_dir: "stats".into(),
            poll_secs: 0,
            timeout_ms: 1000,
        };
        assert!(Monitor::new(&args).is_err());
    }
}
