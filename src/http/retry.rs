//! Classification of service failures into retryable and non-retryable errors.

use reqwest::StatusCode;

/// Errors that should not be retried.
#[derive(Debug, Clone, PartialEq)]
pub enum NonRetryableError {
    /// The API key was rejected (HTTP 401)
    AuthenticationFailed(String),
    /// The API key lacks permission (HTTP 403)
    Forbidden(String),
    /// Model or endpoint not found (HTTP 404)
    NotFound(String),
    /// Other client errors that won't succeed on retry
    ClientError(String),
    /// The service answered, but with a body we could not decode
    InvalidResponse(String),
}

impl std::fmt::Display for NonRetryableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NonRetryableError::AuthenticationFailed(msg) => {
                write!(f, "Authentication failed: {}. Check your API key.", msg)
            }
            NonRetryableError::Forbidden(msg) => {
                write!(f, "Access forbidden: {}", msg)
            }
            NonRetryableError::NotFound(msg) => {
                write!(f, "Not found: {}", msg)
            }
            NonRetryableError::ClientError(msg) => {
                write!(f, "Request error: {}", msg)
            }
            NonRetryableError::InvalidResponse(msg) => {
                write!(f, "Invalid response from service: {}", msg)
            }
        }
    }
}

impl std::error::Error for NonRetryableError {}

/// Classifies an HTTP status as retryable or non-retryable.
/// Returns Ok(()) if a request failing with `status` may be retried.
pub fn classify_status(status: StatusCode, message: &str) -> Result<(), NonRetryableError> {
    match status {
        StatusCode::UNAUTHORIZED => Err(NonRetryableError::AuthenticationFailed(
            message.to_string(),
        )),
        StatusCode::FORBIDDEN => Err(NonRetryableError::Forbidden(message.to_string())),
        StatusCode::NOT_FOUND => Err(NonRetryableError::NotFound(message.to_string())),
        // Rate limiting is transient
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => Ok(()),
        s if s.is_client_error() => Err(NonRetryableError::ClientError(format!(
            "HTTP {}: {}",
            s.as_u16(),
            message
        ))),
        // 5xx server errors are retryable
        _ => Ok(()),
    }
}

/// Builds the error for a failed response, typed as [`NonRetryableError`] when
/// retrying cannot help.
pub fn status_error(status: StatusCode, message: &str) -> anyhow::Error {
    match classify_status(status, message) {
        Ok(()) => anyhow::anyhow!("Service returned HTTP {}: {}", status.as_u16(), message),
        Err(non_retryable) => anyhow::Error::from(non_retryable),
    }
}

/// Everything that isn't explicitly non-retryable is retried: transport errors,
/// timeouts, rate limits and 5xx responses.
pub fn is_retryable_error(e: &anyhow::Error) -> bool {
    e.downcast_ref::<NonRetryableError>().is_none()
}
