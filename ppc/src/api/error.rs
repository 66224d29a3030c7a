use thiserror::Error;

use super::common::ApiErrorDetails;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error (HTTP {status}): {message}")]
    ApiError {
        status: u16,
        message: String,
        #[source]
        details: Option<Box<ApiErrorDetails>>,
    },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Authentication failed")]
    AuthError,

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Too many requests, rate limited")]
    RateLimited,

    #[error("Service unavailable, retry later")]
    ServiceUnavailable,
}

impl ApiError {
    /// HTTP status of an error response, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::ApiError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The remote object does not exist
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// True when the error body mentions `needle`
    pub fn message_contains(&self, needle: &str) -> bool {
        match self {
            ApiError::ApiError {
                message, details, ..
            } => {
                message.contains(needle)
                    || details
                        .as_ref()
                        .and_then(|d| d.description.as_deref())
                        .is_some_and(|d| d.contains(needle))
            }
            _ => false,
        }
    }
}
