use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;

use bench_api::{ErrorKind, NewRecord, StoreError, UpdateOutcome, UpdateRecord};

use super::AppState;

/// Body is decoded by hand so that any malformed input maps to 400,
/// not to axum's 415/422 rejections.
fn decode_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, Response> {
    serde_json::from_slice(body).map_err(|e| {
        (StatusCode::BAD_REQUEST, format!("error: malformed body: {e}")).into_response()
    })
}

fn error_response(e: StoreError) -> Response {
    let status = match e.kind() {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Store | ErrorKind::Io => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, format!("error: {e}")).into_response()
}

// ═══════════════════════════════════════════════════════════════
//  POST /addRow
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_add_row(State(state): State<AppState>, body: Bytes) -> Response {
    let record: NewRecord = match decode_body(&body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    match state.store.insert(record).await {
        Ok(id) => (StatusCode::CREATED, Json(serde_json::json!({ "id": id }))).into_response(),
        Err(e) => error_response(e),
    }
}

// ═══════════════════════════════════════════════════════════════
//  PUT /updateRow
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_update_row(State(state): State<AppState>, body: Bytes) -> Response {
    let record: UpdateRecord = match decode_body(&body) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let id = record.id;

    match state.store.update(record).await {
        Ok(UpdateOutcome::Updated) => StatusCode::OK.into_response(),
        Ok(UpdateOutcome::NotFound) => {
            (StatusCode::NOT_FOUND, format!("error: row {id} not found")).into_response()
        }
        Err(e) => error_response(e),
    }
}

// ═══════════════════════════════════════════════════════════════
//  DELETE /deleteRow/{id}
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_delete_row(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Response {
    match state.store.delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

// ═══════════════════════════════════════════════════════════════
//  GET /getRows
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_get_rows(State(state): State<AppState>) -> Response {
    match state.store.get_all().await {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => error_response(e),
    }
}

// ═══════════════════════════════════════════════════════════════
//  GET /stats
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_stats(State(state): State<AppState>) -> Response {
    match state.stats.snapshot().await {
        Ok(snap) => Json(snap).into_response(),
        Err(e) => {
            tracing::error!(error = ?e, "stats snapshot failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("error: {e}")).into_response()
        }
    }
}
