use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use tokio_util::sync::CancellationToken;

use crate::config::ConfigController;

/// Control API генератора: замена и чтение текущей конфигурации.
pub fn control_router(controller: Arc<ConfigController>) -> Router {
    Router::new()
        .route("/updateConfig", post(handle_update_config))
        .route("/config", get(handle_get_config))
        .with_state(controller)
}

pub async fn run_control(
    port: u16,
    controller: Arc<ConfigController>,
    shutdown: CancellationToken,
) -> Result<(), String> {
    let app = control_router(controller);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .map_err(|e| format!("bind control :{port}: {e}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| format!("axum serve: {e}"))?;

    Ok(())
}

async fn handle_update_config(State(controller): State<Arc<ConfigController>>, body: Bytes) -> Response {
    match controller.replace_json(&body).await {
        Ok(config) => {
            tracing::info!(
                base_url = %config.base_url,
                rates = ?config.rates,
                shape = ?config.shape,
                "load config replaced"
            );
            Json(config.as_ref().clone()).into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "rejected load config");
            (StatusCode::BAD_REQUEST, format!("error: {e}")).into_response()
        }
    }
}

async fn handle_get_config(State(controller): State<Arc<ConfigController>>) -> Json<crate::LoadConfig> {
    Json(controller.get().await.as_ref().clone())
}
