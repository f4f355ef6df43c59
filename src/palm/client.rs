use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{
    Client, Response,
    header::{HeaderMap, HeaderName, HeaderValue},
};
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::TextService;
use super::types::{
    ApiErrorResponse, GenerateTextRequest, GenerateTextResponse, ListModelsResponse,
    ModelDescriptor, TextPrompt,
};
use crate::credential::Credential;
use crate::http::{NonRetryableError, status_error};

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";

const API_VERSION: &str = "v1beta2";
const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-goog-api-key");
const PAGE_SIZE: &str = "50";
/// Guards against a service that never stops handing out page tokens
const MAX_CATALOG_PAGES: usize = 20;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub struct PalmService {
    client: Client,
    endpoint: String,
}

impl PalmService {
    #[tracing::instrument(skip(credential))]
    pub fn new(credential: &Credential, endpoint: &str) -> Result<Self> {
        let mut key = HeaderValue::from_str(credential.expose())
            .context("API key contains characters that are not allowed in an HTTP header")?;
        key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, key);

        let client = Client::builder()
            .user_agent(concat!("codepal/", env!("CODEPAL_VERSION")))
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        debug!(
            "Using API key {} against {}",
            credential.masked(),
            endpoint
        );

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.endpoint, API_VERSION, path)
    }

    async fn fetch_models_page(&self, page_token: Option<&str>) -> Result<ListModelsResponse> {
        let url = self.url("models");
        debug!("Fetching model catalog page from {}...", url);

        let mut request = self.client.get(&url).query(&[("pageSize", PAGE_SIZE)]);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| send_error(e, "Failed to send request to the model catalog"))?;

        decode(response).await
    }
}

#[async_trait]
impl TextService for PalmService {
    #[tracing::instrument(skip(self))]
    async fn list_models(&self) -> Result<Vec<ModelDescriptor>> {
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        let mut pages = 0;

        loop {
            let page = self.fetch_models_page(page_token.as_deref()).await?;
            pages += 1;
            models.extend(page.models);

            page_token = page.next_page_token.filter(|token| !token.is_empty());
            if page_token.is_none() {
                break;
            }
            if pages >= MAX_CATALOG_PAGES {
                warn!(
                    "Model catalog still had more pages after {} requests, using the first {} model(s)",
                    pages,
                    models.len()
                );
                break;
            }
        }

        debug!("Model catalog lists {} model(s)", models.len());
        Ok(models)
    }

    #[tracing::instrument(skip(self, prompt))]
    async fn generate_text(
        &self,
        model: &str,
        prompt: &str,
        temperature: f32,
    ) -> Result<Option<String>> {
        let url = self.url(&format!("{}:generateText", model));
        debug!("Requesting completion from {}...", url);

        let body = GenerateTextRequest {
            prompt: TextPrompt { text: prompt },
            temperature,
            candidate_count: 1,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| send_error(e, "Failed to send request to the text generation API"))?;

        let parsed: GenerateTextResponse = decode(response).await?;

        if parsed.candidates.is_empty() && !parsed.filters.is_empty() {
            let reasons: Vec<&str> = parsed
                .filters
                .iter()
                .filter_map(|f| f.reason.as_deref())
                .collect();
            warn!("All candidates were filtered out: {}", reasons.join(", "));
        }

        Ok(parsed.candidates.into_iter().next().map(|c| c.output))
    }
}

/// Requests that could not be built (malformed URL, bad header) are non-retryable.
fn send_error(e: reqwest::Error, what: &str) -> anyhow::Error {
    if e.is_builder() {
        anyhow::Error::from(NonRetryableError::ClientError(format!("{}: {}", what, e)))
    } else {
        anyhow::Error::from(e).context(what.to_string())
    }
}

/// Turns a response into `T`, or into a classified error for non-2xx statuses.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let body = response
        .bytes()
        .await
        .context("Failed to read response body")?;

    if !status.is_success() {
        let message = error_message(&body, status.canonical_reason().unwrap_or("unknown"));
        debug!("Service returned HTTP {}: {}", status.as_u16(), message);
        return Err(status_error(status, &message));
    }

    serde_json::from_slice(&body)
        .map_err(|e| anyhow::Error::from(NonRetryableError::InvalidResponse(e.to_string())))
}

/// Extracts the human-readable message from an error body.
fn error_message(body: &[u8], fallback: &str) -> String {
    if let Ok(parsed) = serde_json::from_slice::<ApiErrorResponse>(body) {
        if !parsed.error.message.is_empty() {
            return parsed.error.message;
        }
    }

    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        fallback.to_string()
    } else {
        text.chars().take(200).collect()
    }
}
