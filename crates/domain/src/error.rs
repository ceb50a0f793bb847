/// Shared error type used across every engine crate.
///
/// Tool-level failures never reach this type directly — the dispatcher
/// converts them to plain strings before they become `tool_result` rows.
/// `EngineError` is reserved for conditions the step loop itself must act on.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("configuration: {0}")]
    Configuration(String),

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("validation: {0}")]
    Validation(String),

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("logic error: {0}")]
    Logic(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("http: {0}")]
    Http(String),

    #[error("storage: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("pool: {0}")]
    Pool(#[from] r2d2::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
