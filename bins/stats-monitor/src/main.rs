use clap::Parser;
use tokio_util::sync::CancellationToken;

use stats_monitor::{Monitor, MonitorArgs};

#[derive(Parser)]
#[command(name = "stats-monitor", about = "Периодический съём GET /stats в JSON файлы")]
struct Cli {
    #[command(flatten)]
    args: MonitorArgs,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let monitor = match Monitor::new(&cli.args) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let token = CancellationToken::new();
    let ctrl_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutting down...");
        }
        ctrl_token.cancel();
    });

    if let Err(e) = monitor.run(token).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
