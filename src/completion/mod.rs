//! Resilient single-call text completion.
//!
//! [`CompletionClient`] resolves a model (when the request names none), issues the
//! generation call, and retries transient failures according to its [`RetryPolicy`].
//! Failures reach the caller as a [`CompletionError`], which tells recoverable errors
//! apart from the session-fatal [`CompletionError::AccessForbidden`].
//!
//! [`RetryPolicy`]: crate::http::RetryPolicy

mod client;

use async_trait::async_trait;
use std::fmt;

use crate::http::NonRetryableError;
use crate::palm::ModelDescriptor;

pub use client::{CompletionClient, select_text_model};

/// Sampling temperature used when none is given.
pub const DEFAULT_TEMPERATURE: f32 = 0.0;

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    /// Resolved from the model catalog when absent
    pub model: Option<ModelDescriptor>,
    /// In [0.0, 1.0]
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: None,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_model(mut self, model: Option<ModelDescriptor>) -> Self {
        self.model = model;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn validate(&self) -> Result<(), CompletionError> {
        if self.prompt.trim().is_empty() {
            return Err(CompletionError::InvalidRequest(
                "prompt must not be empty".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(CompletionError::InvalidRequest(format!(
                "temperature {} is outside [0.0, 1.0]",
                self.temperature
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompletionResult {
    /// Empty when the service returned no candidate
    pub text: String,
}

#[derive(Debug)]
pub enum CompletionError {
    /// Rejected before anything was sent
    InvalidRequest(String),
    /// The catalog lists no model that supports text generation
    NoModelAvailable,
    /// The API key lacks permission. Ends the session.
    AccessForbidden(String),
    /// Anything else left after retrying
    ServiceError(anyhow::Error),
}

impl CompletionError {
    /// Whether the interactive session should end after this error.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, CompletionError::AccessForbidden(_))
    }
}

impl fmt::Display for CompletionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            CompletionError::NoModelAvailable => {
                write!(f, "No model supporting text generation is available")
            }
            CompletionError::AccessForbidden(msg) => {
                write!(f, "Generative Language API access is forbidden: {}", msg)
            }
            CompletionError::ServiceError(e) => write!(f, "Service request failed: {:#}", e),
        }
    }
}

impl std::error::Error for CompletionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CompletionError::ServiceError(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for CompletionError {
    fn from(e: anyhow::Error) -> Self {
        match e.downcast_ref::<NonRetryableError>() {
            Some(NonRetryableError::Forbidden(msg)) => CompletionError::AccessForbidden(msg.clone()),
            _ => CompletionError::ServiceError(e),
        }
    }
}

/// Anything that can turn a [`CompletionRequest`] into a [`CompletionResult`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Complete: Send + Sync {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResult, CompletionError>;
}
