//! Shared helpers for the HTTP-backed provider adapter.

use memengine_domain::error::EngineError;

/// Convert a [`reqwest::Error`] into the engine error taxonomy (§7):
/// timeouts map to `Timeout`, everything else to `BackendUnavailable`.
pub(crate) fn from_reqwest(e: reqwest::Error) -> EngineError {
    if e.is_timeout() {
        EngineError::Timeout(e.to_string())
    } else {
        EngineError::BackendUnavailable(e.to_string())
    }
}
