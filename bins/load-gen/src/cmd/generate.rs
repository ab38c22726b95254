use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use bench_api::OperationKind;
use load_engine::{ConfigController, HttpDispatcher, IdTracker, LoadGenerator, StreamCounters};

use super::config::Effective;
use super::error::WorkloadError;

/// Период промежуточного отчёта о счётчиках.
const PROGRESS_EVERY: Duration = Duration::from_secs(10);

// ═══════════════════════════════════════════════════════════════
//  Main loop
// ═══════════════════════════════════════════════════════════════

pub async fn run(eff: Effective) -> Result<(), WorkloadError> {
    tracing::info!(
        base_url = %eff.load.base_url,
        rates = ?eff.load.rates,
        shape = ?eff.load.shape,
        timeout_ms = eff.timeout.as_millis() as u64,
        "load-gen starting"
    );

    let controller = Arc::new(ConfigController::new(eff.load));
    let ids = Arc::new(IdTracker::new());
    let dispatcher = Arc::new(HttpDispatcher::new(eff.timeout, ids.clone())?);

    // --- Control API ---
    let token = CancellationToken::new();
    let control_port = eff.control_port;
    let control_controller = controller.clone();
    let control_token = token.clone();
    let control_handle = tokio::spawn(async move {
        if let Err(e) = load_engine::control::run_control(control_port, control_controller, control_token).await {
            tracing::error!(error = %e, "control api error");
        }
    });
    tracing::info!(port = control_port, "control api listening");

    let generator = LoadGenerator::start(controller, dispatcher, ids, eff.seed);

    // --- Ожидание Ctrl+C или конца прогона ---
    let deadline = eff.duration.map(|d| tokio::time::Instant::now() + d);
    let mut progress = tokio::time::interval(PROGRESS_EVERY);
    progress.tick().await;

    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res?;
                tracing::info!("interrupted, stopping...");
                break;
            }
            _ = sleep_until_opt(deadline) => {
                tracing::info!("run duration reached, stopping...");
                break;
            }
            _ = progress.tick() => {
                let counters = generator.counters();
                for (kind, c) in &counters {
                    tracing::info!(
                        kind = %kind,
                        fired = c.fired,
                        ok = c.ok,
                        failed = c.failed,
                        skipped = c.skipped,
                        in_flight = c.in_flight,
                        "progress"
                    );
                }
            }
        }
    }

    let elapsed = generator.elapsed();
    let counters = generator.stop(eff.drain).await;

    token.cancel();
    if let Err(e) = control_handle.await {
        tracing::error!(error = %e, "control api task failed");
    }

    log_summary(&counters, elapsed);
    Ok(())
}

async fn sleep_until_opt(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending().await,
    }
}

fn log_summary(counters: &BTreeMap<OperationKind, StreamCounters>, elapsed: Duration) {
    let secs = elapsed.as_secs_f64().max(f64::EPSILON);
    for (kind, c) in counters {
        tracing::info!(
            kind = %kind,
            fired = c.fired,
            ok = c.ok,
            failed = c.failed,
            skipped = c.skipped,
            abandoned = c.fired.saturating_sub(c.ok + c.failed),
            rate = format_args!("{:.1}", c.fired as f64 / secs),
            elapsed_s = format_args!("{:.1}", secs),
            "stream summary"
        );
    }
}
