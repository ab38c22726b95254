mod http;

use axum::Router;
use axum::routing::{delete, get, post, put};
use tokio_util::sync::CancellationToken;

use record_store::{RecordStore, StatsAggregator};

#[derive(Clone)]
pub(crate) struct AppState {
    store: RecordStore,
    stats: StatsAggregator,
}

/// CRUD + stats routes. Вынесено отдельно от `run`, чтобы тесты
/// гоняли роутер через `oneshot` без сокета.
pub fn router(store: RecordStore, stats: StatsAggregator) -> Router {
    let state = AppState { store, stats };

    Router::new()
        .route("/addRow", post(http::handle_add_row))
        .route("/updateRow", put(http::handle_update_row))
        .route("/deleteRow/{id}", delete(http::handle_delete_row))
        .route("/getRows", get(http::handle_get_rows))
        .route("/stats", get(http::handle_stats))
        .with_state(state)
}

/// HTTP API сервер записей. Завершается по `shutdown`.
pub async fn run(
    port: u16,
    store: RecordStore,
    stats: StatsAggregator,
    shutdown: CancellationToken,
) -> Result<(), String> {
    let app = router(store, stats);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .map_err(|e| format!("bind api :{port}: {e}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| format!("axum serve: {e}"))?;

    Ok(())
}
