#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("store: {0}")]
    Store(#[from] bench_api::StoreError),

    #[error("signal: {0}")]
    Signal(#[from] std::io::Error),
}
