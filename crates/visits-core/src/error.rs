//! Shared error type across visits crates.

use thiserror::Error;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Invalid input or configuration.
    BadRequest,
    /// Unsupported config version.
    UnsupportedVersion,
    /// Backing store unreachable or timed out.
    StoreUnavailable,
    /// Optimistic retry budget exhausted.
    StoreConflict,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    /// String representation used in plain-text error bodies.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ClientCode::StoreUnavailable => "STORE_UNAVAILABLE",
            ClientCode::StoreConflict => "STORE_CONFLICT",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, VisitsError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Error)]
pub enum VisitsError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("store conflict: gave up after {attempts} attempts")]
    StoreConflict { attempts: u32 },
    #[error("internal: {0}")]
    Internal(String),
}

impl VisitsError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            VisitsError::BadRequest(_) => ClientCode::BadRequest,
            VisitsError::UnsupportedVersion => ClientCode::UnsupportedVersion,
            VisitsError::StoreUnavailable(_) => ClientCode::StoreUnavailable,
            VisitsError::StoreConflict { .. } => ClientCode::StoreConflict,
            VisitsError::Internal(_) => ClientCode::Internal,
        }
    }

    /// Store failures a caller may retry. A retry is a new increment, not a reread.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            VisitsError::StoreUnavailable(_) | VisitsError::StoreConflict { .. }
        )
    }
}
