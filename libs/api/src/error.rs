/// Category of a store error. The HTTP layer maps it to a status code,
/// the record store uses it to decide what goes to the diagnostic stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input (bad JSON, missing fields, non-object document).
    Validation,
    /// Engine-side failure (constraint violation, bad query, unknown row shape).
    Store,
    /// Connection or pool failure reaching the engine.
    Io,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Validation => f.write_str("validation"),
            ErrorKind::Store => f.write_str("store"),
            ErrorKind::Io => f.write_str("io"),
        }
    }
}

/// Unified error type for every `StoreBackend` method and record store operation.
///
/// Carries an `ErrorKind` and a human-readable message. `From<serde_json::Error>`
/// assigns `Validation` so encoding paths can use `?`.
#[derive(Clone)]
pub struct StoreError {
    kind: ErrorKind,
    message: String,
}

impl StoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Validation, message: msg.into() }
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Store, message: msg.into() }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Io, message: msg.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Client-side error: the caller sent something unusable.
    pub fn is_validation(&self) -> bool {
        self.kind == ErrorKind::Validation
    }
}

impl std::fmt::Debug for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for StoreError {}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self { Self { kind: ErrorKind::Validation, message: e.to_string() } }
}
