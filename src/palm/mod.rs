//! Client for the Generative Language text API: model catalog and text generation.

mod client;
mod types;

use anyhow::Result;
use async_trait::async_trait;

pub use client::{DEFAULT_ENDPOINT, PalmService};
pub use types::{
    ApiError, ApiErrorResponse, ContentFilter, GenerateTextRequest, GenerateTextResponse,
    ListModelsResponse, ModelDescriptor, TEXT_GENERATION_METHOD, TextCompletion, TextPrompt,
};

/// The remote service as seen by the completion client.
/// Implementations make a single attempt per call; retrying is the caller's job.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextService: Send + Sync {
    /// Returns the whole model catalog in service order.
    async fn list_models(&self) -> Result<Vec<ModelDescriptor>>;

    /// Generates a completion. `Ok(None)` means the service returned no candidate.
    async fn generate_text(
        &self,
        model: &str,
        prompt: &str,
        temperature: f32,
    ) -> Result<Option<String>>;
}
