//! Remote object store error types.

use thiserror::Error;

/// Errors that can occur while talking to the remote object store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Could not obtain an access token for the request.
    #[error("Authorization failed: {0}")]
    Auth(#[from] crate::auth::AuthError),

    /// Transport-level failure before a response arrived.
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The store answered with a non-success status.
    #[error("Store API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// A request body failed to serialize.
    #[error("Failed to encode request body: {0}")]
    Encode(String),

    /// A response arrived but did not decode as expected.
    #[error("Failed to decode store response: {0}")]
    Decode(String),
}

/// Result type for object store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
