//! Core error types for the kiosk protocol.

/// Core error type for kiosk operations.
///
/// Store failures never surface here while the protocol runs; they are
/// classified and recovered where they happen. This type covers setup
/// (configuration, launch URL) and the local cache backends.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid launch URL: {0}")]
    LaunchUrl(#[from] url::ParseError),

    #[error("Store error: {0}")]
    Store(#[from] kiosk_client_api::StoreError),

    #[error("Local cache error: {0}")]
    Database(#[from] kiosk_local_db::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

impl Error {
    /// Create a new configuration error.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new generic error.
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }
}
