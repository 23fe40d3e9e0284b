//! Client error types.

/// Errors that can occur when using the warung client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned an error response.
    #[error("API error: {code} - {message}")]
    Api {
        /// Error code.
        code: String,
        /// Error message.
        message: String,
        /// HTTP status code.
        status: u16,
    },

    /// A product, transaction or line item did not resolve.
    ///
    /// The message names the identifier the server failed to find.
    #[error("not found: {message}")]
    NotFound {
        /// Server message.
        message: String,
    },

    /// The transaction is no longer pending.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Server message.
        message: String,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}
