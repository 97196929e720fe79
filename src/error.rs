//! Crate-level error type.
//!
//! Every fallible operation in the library returns [`SyncError`]. None of the
//! variants is fatal to the control loop: the pollers log and retry on the
//! next tick, the submitter turns failures into an inline error bubble.

use thiserror::Error;

/// Errors raised by the backend client, the session store, and audio capture.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A TCP-level connection could not be established, or the request timed out.
    #[error("Connection failed to {url}: {detail}")]
    Connect { url: String, detail: String },

    /// The backend replied with a non-2xx HTTP status code.
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    /// Response body could not be parsed as the expected JSON structure.
    #[error("JSON parse error on field '{field}': {detail}")]
    Json { field: String, detail: String },

    /// The backend accepted the request but reported a logical error.
    #[error("Backend rejected request: {0}")]
    Rejected(String),

    /// A payload failed local validation before anything was sent.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Microphone (or other capture device) access was refused.
    #[error("Capture permission denied: {0}")]
    PermissionDenied(String),

    /// Configuration could not be loaded or is inconsistent.
    #[error("Config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// True for failures of the transport itself (unreachable host, non-2xx,
    /// unparseable body). These are the ones the pollers silently retry.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            SyncError::Connect { .. } | SyncError::Http { .. } | SyncError::Json { .. }
        )
    }
}
