//! Error types for backend access and table sync.

use thiserror::Error;

/// Errors raised by a [`TableBackend`](crate::backend::TableBackend).
#[derive(Debug, Error)]
pub enum BackendError {
    /// Request could not be sent or the response body could not be read.
    #[error("HTTP error: {0}")]
    Http(String),
    /// Server answered with a non-success status.
    #[error("Server returned status {status}: {message}")]
    Status { status: u16, message: String },
    /// Response body did not have the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),
    /// Connection to the backend or its push channel failed.
    #[error("Connection error: {0}")]
    Connection(String),
    /// Row addressed by id does not exist.
    #[error("Row not found: {table}/{id}")]
    RowNotFound { table: String, id: String },
    /// Internal lock was poisoned by a panicking writer.
    #[error("Lock poisoned: {0}")]
    LockPoisoned(&'static str),
}

/// Errors surfaced by table sync mutations and entity stores.
///
/// Reads never produce these; they fall back to the local cache instead.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Backend is not configured or the connectivity flag is off.
    #[error("Not connected to the backend; the change was not saved")]
    NotConnected,
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// A field value was rejected before reaching the backend.
    #[error("Validation failed: {0}")]
    Validation(String),
}

/// Coarse classification used to decide how an error is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Connectivity,
    Storage,
    Unknown,
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::NotConnected => ErrorKind::Connectivity,
            SyncError::Validation(_) => ErrorKind::Validation,
            SyncError::Backend(e) => e.kind(),
        }
    }
}

impl BackendError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BackendError::Http(_) | BackendError::Connection(_) => ErrorKind::Connectivity,
            BackendError::Status { status, .. } if *status >= 500 => ErrorKind::Connectivity,
            BackendError::Status {
                status: 400 | 409 | 422,
                ..
            } => ErrorKind::Validation,
            _ => ErrorKind::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_connected_is_connectivity() {
        assert_eq!(SyncError::NotConnected.kind(), ErrorKind::Connectivity);
    }

    #[test]
    fn test_status_classification() {
        let server = BackendError::Status {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert_eq!(server.kind(), ErrorKind::Connectivity);

        let conflict = BackendError::Status {
            status: 409,
            message: "duplicate key".to_string(),
        };
        assert_eq!(SyncError::from(conflict).kind(), ErrorKind::Validation);

        let missing = BackendError::RowNotFound {
            table: "staff".to_string(),
            id: "1".to_string(),
        };
        assert_eq!(missing.kind(), ErrorKind::Unknown);
    }

    #[test]
    fn test_display_messages() {
        let err = SyncError::Validation("title is required".to_string());
        assert_eq!(err.to_string(), "Validation failed: title is required");

        let err = SyncError::from(BackendError::Connection("refused".to_string()));
        assert_eq!(err.to_string(), "Connection error: refused");
    }
}
