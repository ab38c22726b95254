#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("config: {0}")]
    Config(String),

    #[error("fetch {url}: {detail}")]
    Fetch { url: String, detail: String },

    #[error("export '{path}': {source}")]
    Export { path: String, source: std::io::Error },

    #[error("encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}
