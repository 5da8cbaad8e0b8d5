use std::time::Duration;
use thiserror::Error;

/// How the low-level transport classified a failed request. The executor
/// consults this to decide retry vs. propagate (spec §7): only `Throttled`
/// and `Transient` are retried here; everything else bubbles up.
#[derive(Debug, Clone)]
pub enum RemoteErrorKind {
    /// The remote signalled rate limiting (HTTP 429 or equivalent).
    Throttled { retry_after: Option<Duration> },
    /// Network reset, 5xx, timeout — safe to retry the same request.
    Transient,
    /// The request is not known to have reached the server (e.g. a
    /// connection reset before the response), so even non-idempotent
    /// `Create` operations may be retried.
    NotSent,
    /// The remote rejected a specific record inside an otherwise
    /// successful batch (validation, missing reference, permission).
    PermanentPerRecord {
        error_code: model::ErrorCode,
        field: Option<String>,
    },
    /// The remote rejected the whole request in a non-retryable way.
    PermanentFatal,
}

#[derive(Debug, Error)]
#[error("{kind:?}: {message}")]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            RemoteErrorKind::Throttled { .. } | RemoteErrorKind::Transient | RemoteErrorKind::NotSent
        )
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("authentication failed: {0}")]
    AuthFailed(String),
    #[error("client acquisition was cancelled")]
    Cancelled,
    #[error("transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("no source can serve this endpoint")]
    NoSource,
    #[error("acquisition cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum FileError {
    #[error("io error reading file: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("mapping references unknown source column: {0}")]
    UnknownColumn(String),
    #[error("lookup resolution error for field '{field}': {message}")]
    LookupResolution { field: String, message: String },
}
