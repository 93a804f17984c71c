//! Authorization error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while obtaining or persisting credentials.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Failed to read the client secrets file.
    #[error("Failed to read client secrets '{path}': {source}")]
    ReadSecrets {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Client secrets file parsed but had no usable application entry.
    #[error("Invalid client secrets: {0}")]
    InvalidSecrets(String),

    /// Failed to build the HTTP client.
    #[error("Failed to create HTTP client: {0}")]
    HttpClient(String),

    /// The device code request was rejected or did not decode.
    #[error("Device code request failed: {0}")]
    DeviceCode(String),

    /// The device code expired before the user approved it.
    #[error("Device code expired before authorization")]
    Expired,

    /// The user rejected the authorization request.
    #[error("User denied the authorization request")]
    Denied,

    /// Token endpoint returned an unexpected error.
    #[error("Token request failed: {0}")]
    TokenExchange(String),

    /// Exchanging the refresh token for a fresh access token failed.
    #[error("Token refresh failed: {0}")]
    Refresh(String),

    /// Reading or writing the persisted token failed.
    #[error("Token store error for '{path}': {source}")]
    TokenStore {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The persisted token did not parse.
    #[error("Failed to parse stored token: {0}")]
    ParseToken(#[from] serde_json::Error),

    /// No stored grant and no way to mint one non-interactively.
    #[error("Not authorized: no usable stored token")]
    NotAuthorized,
}

/// Result type for authorization operations.
pub type Result<T> = std::result::Result<T, AuthError>;
