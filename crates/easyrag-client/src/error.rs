//! Error types for the client library.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Error body returned by a backend.
///
/// OpenAI-style APIs nest a message object, Ollama-style APIs return a bare
/// string.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    /// The error payload.
    pub error: ErrorPayload,
}

/// The `error` field of an [`ErrorResponse`].
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ErrorPayload {
    /// `{"error": {"message": "..."}}`
    Detail {
        /// The error message text.
        message: String,
    },
    /// `{"error": "..."}`
    Text(String),
}

impl ErrorResponse {
    /// The message carried by either payload shape.
    #[must_use]
    pub fn message(&self) -> &str {
        match &self.error {
            ErrorPayload::Detail { message } | ErrorPayload::Text(message) => message,
        }
    }
}

/// Errors that can occur when talking to a chat backend.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// Network or HTTP request failure.
    ///
    /// Indicates issues like DNS resolution, connection failures, or socket errors.
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// Middleware layer error, usually the last failure after transport retries.
    #[error("Middleware error: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),

    /// JSON serialization or deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// API authentication failure (HTTP 401).
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// Rate limit exceeded (HTTP 429).
    #[error("Rate limit exceeded: {retry_after:?}")]
    RateLimitError {
        /// Suggested wait time before retrying, if provided by the API.
        retry_after: Option<Duration>,
    },

    /// API service unavailable (5xx errors).
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Any other non-success HTTP status.
    #[error("Request failed with status {status}: {message}")]
    RequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error message extracted from the body.
        message: String,
    },

    /// Client configuration issue.
    ///
    /// Invalid base URL, missing API key, or incompatible settings.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// A reply that is missing the parts every backend must send.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// A strict backend replied in a shape its protocol does not allow.
    ///
    /// Never retried: a strict backend that breaks its own contract will not
    /// fix itself on a resend.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Temperature parameter out of valid range.
    #[error("Temperature must be between 0.0 & 2.0")]
    InvalidTemperature,

    /// `top_p` parameter out of valid range.
    #[error("TopP must be between 0.0 & 1.0")]
    InvalidTopP,

    /// `frequency_penalty` parameter out of valid range.
    #[error("FrequencyPenalty must be between -2.0 & 2.0")]
    InvalidFrequencyPenalty,
}

impl ClientError {
    /// Check if this error is potentially retryable.
    ///
    /// Returns `true` for network errors, rate limits, and service unavailable errors.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError(_)
                | Self::MiddlewareError(_)
                | Self::RateLimitError { .. }
                | Self::ServiceUnavailable(_)
        )
    }

    /// Check if this is an authentication error.
    pub const fn is_authentication_error(&self) -> bool {
        matches!(self, Self::AuthenticationError(_))
    }

    /// Get the retry-after duration if this is a rate limit error.
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimitError { retry_after } => *retry_after,
            _ => None,
        }
    }
}
