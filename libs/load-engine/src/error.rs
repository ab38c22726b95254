use bench_api::OperationKind;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("invalid load config: {0}")]
    InvalidConfig(#[from] serde_json::Error),

    #[error("http client: {0}")]
    Client(String),

    #[error("{kind}: transport: {detail}")]
    Transport { kind: OperationKind, detail: String },

    #[error("{kind}: status {status}: {body}")]
    Status { kind: OperationKind, status: u16, body: String },
}
