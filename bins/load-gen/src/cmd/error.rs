#[derive(Debug, thiserror::Error)]
pub enum WorkloadError {
    #[error("{0}")]
    Config(String),

    #[error("{0}")]
    Load(#[from] load_engine::LoadError),

    #[error("signal: {0}")]
    Signal(#[from] std::io::Error),
}
