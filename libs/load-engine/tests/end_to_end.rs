//! Drives a real CRUD server (in-memory backend) over HTTP.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use bench_api::OperationKind;
use load_engine::{ConfigController, HttpDispatcher, IdTracker, LoadConfig, LoadGenerator, Shape};
use record_store::{RecordStore, StatsAggregator};
use storage_memory::MemoryBackend;

async fn spawn_server(backend: Arc<MemoryBackend>, shutdown: CancellationToken) -> String {
    let app = crud_api_server::router(
        RecordStore::new(backend.clone()),
        StatsAggregator::new(backend),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
            .unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_generator_against_live_server() {
    let backend = Arc::new(MemoryBackend::new());
    let shutdown = CancellationToken::new();
    let base_url = spawn_server(backend.clone(), shutdown.clone()).await;

    let controller = Arc::new(ConfigController::new(LoadConfig {
        base_url,
        rates: BTreeMap::from([
            (OperationKind::Insert, 40.0),
            (OperationKind::Update, 10.0),
            (OperationKind::Delete, 5.0),
            (OperationKind::Select, 5.0),
        ]),
        shape: Shape { field_count: 3, field_string_length: 20 },
        max_in_flight: None,
    }));
    let ids = Arc::new(IdTracker::new());
    let dispatcher = Arc::new(HttpDispatcher::new(Duration::from_secs(5), ids.clone()).unwrap());

    let generator = LoadGenerator::start(controller, dispatcher, ids.clone(), 11);
    tokio::time::sleep(Duration::from_millis(1000)).await;
    let counters = generator.stop(Duration::from_secs(5)).await;
    shutdown.cancel();

    let inserts = counters[&OperationKind::Insert];
    assert!(inserts.ok > 0);
    assert_eq!(inserts.failed, 0);
    assert!(ids.high_water() as u64 >= inserts.ok);

    // DELETE is idempotent, never an error
    let deletes = counters[&OperationKind::Delete];
    assert_eq!(deletes.failed, 0);
    assert_eq!(counters[&OperationKind::Select].failed, 0);

    let log = backend.log_entries().await;
    let logged = |kind| log.iter().filter(|e| e.operation_kind == kind).count() as u64;
    assert_eq!(logged(OperationKind::Insert), inserts.ok);
    assert_eq!(logged(OperationKind::Delete), deletes.ok);
    assert_eq!(logged(OperationKind::Select), counters[&OperationKind::Select].ok);
}
