use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use bench_api::OperationKind;

use crate::config::{ConfigController, LoadConfig, MAX_TICK_INTERVAL};
use crate::dispatch::Dispatcher;
use crate::payload::{IdTracker, OpRequest, Rng};

/// Как часто выключенный поток перечитывает конфигурацию.
pub const IDLE_POLL: Duration = Duration::from_millis(250);

// ═══════════════════════════════════════════════════════════════
//  Counters
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct StreamStats {
    fired: AtomicU64,
    ok: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
    in_flight: AtomicUsize,
}

impl StreamStats {
    fn snapshot(&self) -> StreamCounters {
        StreamCounters {
            fired: self.fired.load(Ordering::Relaxed),
            ok: self.ok.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
        }
    }
}

/// Счётчики одного потока на момент снятия.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamCounters {
    pub fired: u64,
    pub ok: u64,
    pub failed: u64,
    /// Tick dropped because `max_in_flight` was saturated.
    pub skipped: u64,
    pub in_flight: usize,
}

// ═══════════════════════════════════════════════════════════════
//  LoadGenerator
// ═══════════════════════════════════════════════════════════════

/// Четыре независимых потока (по одному на `OperationKind`), каждый со
/// своим тикером. Запросы fire-and-forget: тик не ждёт ответа.
pub struct LoadGenerator {
    token: CancellationToken,
    abort: CancellationToken,
    streams: Vec<(OperationKind, JoinHandle<()>)>,
    in_flight: TaskTracker,
    stats: BTreeMap<OperationKind, Arc<StreamStats>>,
    started: Instant,
}

impl LoadGenerator {
    /// Spawn one stream per kind. Must be called inside a tokio runtime.
    pub fn start(
        controller: Arc<ConfigController>,
        dispatcher: Arc<dyn Dispatcher>,
        ids: Arc<IdTracker>,
        seed: u64,
    ) -> Self {
        let token = CancellationToken::new();
        let abort = CancellationToken::new();
        let in_flight = TaskTracker::new();
        let mut master = Rng::new(seed);
        let mut stats = BTreeMap::new();
        let mut streams = Vec::with_capacity(OperationKind::ALL.len());

        for kind in OperationKind::ALL {
            let stream_stats = Arc::new(StreamStats::default());
            stats.insert(kind, stream_stats.clone());

            let stream = Stream {
                kind,
                controller: controller.clone(),
                dispatcher: dispatcher.clone(),
                ids: ids.clone(),
                rng: master.fork(),
                stats: stream_stats,
                tracker: in_flight.clone(),
                abort: abort.clone(),
            };
            let handle = tokio::spawn(stream.run(token.clone()));
            streams.push((kind, handle));
        }

        tracing::info!(streams = streams.len(), "load generator started");

        Self {
            token,
            abort,
            streams,
            in_flight,
            stats,
            started: Instant::now(),
        }
    }

    pub fn counters(&self) -> BTreeMap<OperationKind, StreamCounters> {
        self.stats.iter().map(|(k, s)| (*k, s.snapshot())).collect()
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Остановить все потоки и дождаться in-flight запросов не дольше `drain`.
    ///
    /// No request is fired once this returns. Requests still pending after
    /// `drain` are abandoned.
    pub async fn stop(self, drain: Duration) -> BTreeMap<OperationKind, StreamCounters> {
        self.token.cancel();

        for (kind, handle) in self.streams {
            if let Err(e) = handle.await {
                tracing::error!(kind = %kind, error = %e, "stream task failed");
            }
        }

        self.in_flight.close();
        if tokio::time::timeout(drain, self.in_flight.wait()).await.is_err() {
            tracing::warn!(pending = self.in_flight.len(), "drain timeout, abandoning in-flight requests");
            self.abort.cancel();
            self.in_flight.wait().await;
        }

        tracing::info!("load generator stopped");
        self.stats.iter().map(|(k, s)| (*k, s.snapshot())).collect()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Stream
// ═══════════════════════════════════════════════════════════════

struct Stream {
    kind: OperationKind,
    controller: Arc<ConfigController>,
    dispatcher: Arc<dyn Dispatcher>,
    ids: Arc<IdTracker>,
    rng: Rng,
    stats: Arc<StreamStats>,
    tracker: TaskTracker,
    abort: CancellationToken,
}

impl Stream {
    async fn run(mut self, token: CancellationToken) {
        let mut next = Instant::now();
        let mut enabled = false;

        loop {
            let config = self.controller.get().await;

            let Some(interval) = config.interval(self.kind) else {
                if enabled {
                    tracing::info!(kind = %self.kind, "stream disabled");
                    enabled = false;
                }
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(IDLE_POLL) => {}
                }
                next = Instant::now();
                continue;
            };

            if !enabled {
                tracing::info!(kind = %self.kind, interval = ?interval, "stream running");
                enabled = true;
            }

            self.fire(&config);

            // deadlines advance from the previous deadline; a missed one is re-based
            let now = Instant::now();
            next = match next.checked_add(interval) {
                Some(deadline) if deadline >= now => deadline,
                Some(_) => now,
                None => {
                    tracing::warn!(kind = %self.kind, interval = ?interval, "deadline overflow, re-based");
                    now + MAX_TICK_INTERVAL
                }
            };

            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = tokio::time::sleep_until(next) => {}
            }
        }

        tracing::debug!(kind = %self.kind, "stream stopped");
    }

    fn fire(&mut self, config: &LoadConfig) {
        let saturated = config
            .max_in_flight
            .is_some_and(|cap| self.stats.in_flight.load(Ordering::Relaxed) >= cap);
        if saturated {
            self.stats.skipped.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let request = OpRequest::build(self.kind, config, &mut self.rng, &self.ids);
        let pending = self.dispatcher.dispatch(&config.base_url, request);

        self.stats.fired.fetch_add(1, Ordering::Relaxed);
        self.stats.in_flight.fetch_add(1, Ordering::Relaxed);

        let kind = self.kind;
        let stats = self.stats.clone();
        let abort = self.abort.clone();
        self.tracker.spawn(async move {
            tokio::select! {
                res = pending => match res {
                    Ok(()) => {
                        stats.ok.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        stats.failed.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(kind = %kind, error = %e, "request failed");
                    }
                },
                _ = abort.cancelled() => {}
            }
            stats.in_flight.fetch_sub(1, Ordering::Relaxed);
        });
    }
}
