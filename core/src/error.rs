//! Error types for the item client and the synchronizer.
//!
//! # Design
//! `ApiError` describes why one remote call failed. `SyncError` is what the
//! synchronizer surfaces to the UI: one variant per operation, so its
//! `Display` reads as a banner message, with the `ApiError` kept as source.

use thiserror::Error;

use crate::transport::TransportError;

/// Errors produced while building, executing or parsing a remote call.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The server returned 404: the item does not exist.
    #[error("resource not found")]
    NotFound,

    /// The server returned a non-2xx status other than 404.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// The request never produced a response.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// The error state surfaced by `ListSynchronizer`.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    #[error("Title must not be empty")]
    EmptyTitle,

    #[error("Failed to fetch items: {0}")]
    Refresh(#[source] ApiError),

    #[error("Failed to create item: {0}")]
    Add(#[source] ApiError),

    #[error("Failed to update item: {0}")]
    Update(#[source] ApiError),

    #[error("Failed to delete item: {0}")]
    Delete(#[source] ApiError),
}

/// Errors loading `SyncConfig` from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_error_reads_as_banner_text() {
        let err = SyncError::Delete(ApiError::HttpError {
            status: 500,
            body: "boom".to_string(),
        });
        assert_eq!(err.to_string(), "Failed to delete item: HTTP 500: boom");
    }

    #[test]
    fn transport_error_is_transparent() {
        let err = ApiError::from(TransportError::Timeout);
        assert_eq!(err.to_string(), TransportError::Timeout.to_string());
    }
}
