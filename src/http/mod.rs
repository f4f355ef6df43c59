//! HTTP error classification and the retry policy wrapped around network calls.

mod policy;
mod retry;

pub use policy::{RetryPolicy, RetryPredicate};
pub use retry::{NonRetryableError, classify_status, is_retryable_error, status_error};
