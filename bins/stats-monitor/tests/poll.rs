//! Monitor against a stub `/stats` endpoint on a real socket.

use std::collections::BTreeMap;
use std::path::PathBuf;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Json;

use bench_api::{AggregateSnapshot, KindAverages, OperationKind, OverflowUsage};
use stats_monitor::{Monitor, MonitorArgs};

fn snapshot() -> AggregateSnapshot {
    AggregateSnapshot {
        per_kind: BTreeMap::from([(
            OperationKind::Insert,
            KindAverages { samples: 3, avg_duration_ms: 1.5, avg_payload_bytes: Some(120.0) },
        )]),
        overflow: vec![OverflowUsage {
            unit_name: "records".into(),
            overflow_bytes: 16384,
            human_readable_size: "16 kB".into(),
        }],
        database: Vec::new(),
    }
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn export_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("stats-monitor-{name}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn args(base_url: String, export_dir: PathBuf) -> MonitorArgs {
    MonitorArgs { base_url, export_dir, poll_secs: 1, timeout_ms: 2000 }
}

#[tokio::test]
async fn test_fetch_and_export() {
    let base = serve(Router::new().route("/stats", get(|| async { Json(snapshot()) }))).await;
    let dir = export_dir("ok");
    let monitor = Monitor::new(&args(base, dir.clone())).unwrap();

    let snap = monitor.fetch().await.unwrap();
    assert_eq!(snap, snapshot());

    let path = monitor.export(&snap).await.unwrap();
    let name = path.file_name().unwrap().to_str().unwrap().to_string();
    assert!(name.starts_with("stats_") && name.ends_with(".json"), "{name}");

    let written: AggregateSnapshot = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(written, snapshot());

    std::fs::remove_dir_all(dir).ok();
}

#[tokio::test]
async fn test_server_error_is_reported() {
    let base = serve(Router::new().route(
        "/stats",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "error: store down") }),
    ))
    .await;
    let monitor = Monitor::new(&args(base, export_dir("err"))).unwrap();

    assert!(monitor.fetch().await.is_err());
}
