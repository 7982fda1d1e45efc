//! Error types for the application

use thiserror::Error;

/// Result type alias using our ClientError
pub type Result<T> = std::result::Result<T, ClientError>;

/// Main error type for gateway, ledger and configuration operations
#[derive(Error, Debug)]
pub enum ClientError {
    /// HTTP request errors
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Filesystem errors (ledger, notification log)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Authentication errors
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limit exceeded: {message}, retry after {retry_after_seconds:?} seconds")]
    RateLimit {
        message: String,
        retry_after_seconds: Option<u64>,
    },

    /// Error reported by the exchange itself
    #[error("Exchange error {code}: {message}")]
    Exchange { code: i64, message: String },

    /// Invalid API response
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Market not found
    #[error("Market not found: {0}")]
    MarketNotFound(String),

    /// Not enough free balance to size an order
    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),

    /// Telegram refused a notification
    #[error("Notification delivery failed with status {status}: {message}")]
    Notification { status: u16, message: String },

    /// Timeout errors
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClientError {
    /// Whether the error came from reading market or account data
    /// and is expected to clear up on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ClientError::HttpRequest(_)
                | ClientError::RateLimit { .. }
                | ClientError::Timeout(_)
                | ClientError::Exchange { .. }
                | ClientError::InvalidResponse(_)
        )
    }
}
