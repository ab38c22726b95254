use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use bench_api::OperationKind;

use crate::LoadError;
use crate::payload::{IdTracker, OpRequest};

/// Клиентский таймаут запроса по умолчанию.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Отправка одного запроса к CRUD API.
///
/// The returned future owns everything it needs so the generator can spawn
/// it and move on to the next tick without awaiting it.
pub trait Dispatcher: Send + Sync + 'static {
    fn dispatch(
        &self,
        base_url: &str,
        request: OpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<(), LoadError>> + Send + 'static>>;
}

// ═══════════════════════════════════════════════════════════════
//  HttpDispatcher
// ═══════════════════════════════════════════════════════════════

#[derive(Deserialize)]
struct Created {
    id: i64,
}

pub struct HttpDispatcher {
    client: reqwest::Client,
    ids: Arc<IdTracker>,
}

impl HttpDispatcher {
    pub fn new(timeout: Duration, ids: Arc<IdTracker>) -> Result<Self, LoadError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LoadError::Client(e.to_string()))?;
        Ok(Self { client, ids })
    }
}

impl Dispatcher for HttpDispatcher {
    fn dispatch(
        &self,
        base_url: &str,
        request: OpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<(), LoadError>> + Send + 'static>> {
        let base = base_url.trim_end_matches('/');
        let kind = request.kind();

        let builder = match &request {
            OpRequest::Insert(rec) => self.client.post(format!("{base}/addRow")).json(rec),
            OpRequest::Update(rec) => self.client.put(format!("{base}/updateRow")).json(rec),
            OpRequest::Delete { id } => self.client.delete(format!("{base}/deleteRow/{id}")),
            OpRequest::Select => self.client.get(format!("{base}/getRows")),
        };
        let ids = self.ids.clone();

        Box::pin(async move {
            let resp = builder.send().await.map_err(|e| transport(kind, e))?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(LoadError::Status { kind, status: status.as_u16(), body });
            }

            match kind {
                OperationKind::Insert => {
                    let created: Created = resp.json().await.map_err(|e| transport(kind, e))?;
                    ids.observe(created.id);
                }
                // drain the body so the connection goes back to the pool
                _ => {
                    resp.bytes().await.map_err(|e| transport(kind, e))?;
                }
            }
            Ok(())
        })
    }
}

fn transport(kind: OperationKind, e: reqwest::Error) -> LoadError {
    LoadError::Transport { kind, detail: e.to_string() }
}
