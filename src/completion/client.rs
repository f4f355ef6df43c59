use async_trait::async_trait;
use log::{debug, info};

use super::{Complete, CompletionError, CompletionRequest, CompletionResult};
use crate::http::RetryPolicy;
use crate::palm::{ModelDescriptor, TextService};

/// Picks the first catalog entry that supports text generation, keeping catalog order.
pub fn select_text_model(models: Vec<ModelDescriptor>) -> Option<ModelDescriptor> {
    models.into_iter().find(|m| m.supports_text_generation())
}

pub struct CompletionClient<S: TextService> {
    service: S,
    retry: RetryPolicy,
}

impl<S: TextService> CompletionClient<S> {
    pub fn new(service: S, retry: RetryPolicy) -> Self {
        Self { service, retry }
    }

    /// Queries the catalog and returns the first text-generation model.
    /// Nothing is cached; every call sees the current catalog.
    #[tracing::instrument(skip(self))]
    pub async fn resolve_model(&self) -> Result<ModelDescriptor, CompletionError> {
        let models = self
            .retry
            .run("Listing models", || self.service.list_models())
            .await?;

        let model = select_text_model(models).ok_or(CompletionError::NoModelAvailable)?;
        info!("Using model {}", model.name);
        Ok(model)
    }

    #[tracing::instrument(skip(self, request), fields(temperature = request.temperature))]
    pub async fn generate(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResult, CompletionError> {
        request.validate()?;

        let model = match &request.model {
            Some(model) => model.clone(),
            None => self.resolve_model().await?,
        };

        let output = self
            .retry
            .run("Generating text", || {
                self.service
                    .generate_text(&model.name, &request.prompt, request.temperature)
            })
            .await?;

        let text = output.unwrap_or_default();
        debug!("Received {} byte(s) of generated text", text.len());
        Ok(CompletionResult { text })
    }
}

#[async_trait]
impl<S: TextService> Complete for CompletionClient<S> {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResult, CompletionError> {
        self.generate(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::Credential;
    use crate::http::NonRetryableError;
    use crate::palm::{MockTextService, PalmService};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn model(name: &str, methods: &[&str]) -> ModelDescriptor {
        ModelDescriptor {
            name: name.to_string(),
            supported_generation_methods: methods.iter().map(|m| m.to_string()).collect(),
            ..Default::default()
        }
    }

    fn catalog() -> Vec<ModelDescriptor> {
        vec![
            model("models/m1", &["embedText"]),
            model("models/m2", &["generateText", "countTextTokens"]),
            model("models/m3", &["generateText"]),
        ]
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::default()
            .with_initial_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(2))
    }

    #[test]
    fn test_select_text_model_keeps_catalog_order() {
        let selected = select_text_model(catalog()).unwrap();
        assert_eq!(selected.name, "models/m2");

        assert_eq!(select_text_model(vec![model("models/m1", &[])]), None);
        assert_eq!(select_text_model(Vec::new()), None);
    }

    #[tokio::test]
    async fn test_generate_resolves_first_text_model() {
        let mut service = MockTextService::new();
        service
            .expect_list_models()
            .times(1)
            .returning(|| Ok(catalog()));
        service
            .expect_generate_text()
            .withf(|model, prompt, temperature| {
                model == "models/m2" && prompt == "hello" && *temperature == 0.0
            })
            .times(1)
            .returning(|_, _, _| Ok(Some("hi there".to_string())));

        let client = CompletionClient::new(service, fast_retry());
        let result = client
            .generate(&CompletionRequest::new("hello"))
            .await
            .unwrap();

        assert_eq!(result.text, "hi there");
    }

    #[tokio::test]
    async fn test_generate_with_explicit_model_skips_catalog() {
        let mut service = MockTextService::new();
        service.expect_list_models().times(0);
        service
            .expect_generate_text()
            .withf(|model, _, temperature| model == "models/text-bison-001" && *temperature == 0.7)
            .times(1)
            .returning(|_, _, _| Ok(Some("ok".to_string())));

        let client = CompletionClient::new(service, fast_retry());
        let request = CompletionRequest::new("hello")
            .with_model(Some(ModelDescriptor::named("text-bison-001")))
            .with_temperature(0.7);

        assert_eq!(client.generate(&request).await.unwrap().text, "ok");
    }

    #[tokio::test]
    async fn test_generate_no_model_available() {
        let mut service = MockTextService::new();
        service
            .expect_list_models()
            .times(1)
            .returning(|| Ok(vec![model("models/m1", &["embedText"])]));
        service.expect_generate_text().times(0);

        let client = CompletionClient::new(service, fast_retry());
        let err = client
            .generate(&CompletionRequest::new("hello"))
            .await
            .unwrap_err();

        assert!(matches!(err, CompletionError::NoModelAvailable));
    }

    #[test_log::test(tokio::test)]
    async fn test_generate_retries_transient_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut service = MockTextService::new();
        service
            .expect_generate_text()
            .times(3)
            .returning(move |_, _, _| {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(anyhow::anyhow!("Service returned HTTP 503: unavailable"))
                } else {
                    Ok(Some("third time lucky".to_string()))
                }
            });

        let client = CompletionClient::new(service, fast_retry());
        let request =
            CompletionRequest::new("hello").with_model(Some(ModelDescriptor::named("m2")));
        let result = client.generate(&request).await.unwrap();

        assert_eq!(result.text, "third time lucky");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_generate_retries_catalog_query() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut service = MockTextService::new();
        service.expect_list_models().times(2).returning(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(anyhow::anyhow!("connection reset"))
            } else {
                Ok(catalog())
            }
        });
        service
            .expect_generate_text()
            .times(1)
            .returning(|_, _, _| Ok(Some("done".to_string())));

        let client = CompletionClient::new(service, fast_retry());
        let result = client
            .generate(&CompletionRequest::new("hello"))
            .await
            .unwrap();

        assert_eq!(result.text, "done");
    }

    #[tokio::test]
    async fn test_generate_forbidden_is_not_retried() {
        let mut service = MockTextService::new();
        service.expect_generate_text().times(1).returning(|_, _, _| {
            Err(anyhow::Error::from(NonRetryableError::Forbidden(
                "API not enabled".to_string(),
            )))
        });

        let client = CompletionClient::new(service, fast_retry());
        let request =
            CompletionRequest::new("hello").with_model(Some(ModelDescriptor::named("m2")));
        let err = client.generate(&request).await.unwrap_err();

        assert!(matches!(err, CompletionError::AccessForbidden(_)));
        assert!(err.is_session_fatal());
    }

    #[tokio::test]
    async fn test_generate_forbidden_catalog_is_access_forbidden() {
        let mut service = MockTextService::new();
        service.expect_list_models().times(1).returning(|| {
            Err(anyhow::Error::from(NonRetryableError::Forbidden(
                "denied".to_string(),
            )))
        });

        let client = CompletionClient::new(service, fast_retry());
        let err = client
            .generate(&CompletionRequest::new("hello"))
            .await
            .unwrap_err();

        assert!(matches!(err, CompletionError::AccessForbidden(_)));
    }

    #[tokio::test]
    async fn test_generate_exhausted_retries_is_service_error() {
        let mut service = MockTextService::new();
        service
            .expect_generate_text()
            .times(2)
            .returning(|_, _, _| Err(anyhow::anyhow!("operation timed out")));

        let client = CompletionClient::new(service, fast_retry().with_max_attempts(2));
        let request =
            CompletionRequest::new("hello").with_model(Some(ModelDescriptor::named("m2")));
        let err = client.generate(&request).await.unwrap_err();

        match err {
            CompletionError::ServiceError(cause) => {
                assert!(cause.to_string().contains("timed out"));
            }
            other => panic!("Expected ServiceError, got {:?}", other),
        }
    }

    /// Counts calls reaching a real service.
    struct CountingService<S> {
        inner: S,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl<S: TextService> TextService for CountingService<S> {
        async fn list_models(&self) -> anyhow::Result<Vec<ModelDescriptor>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.list_models().await
        }

        async fn generate_text(
            &self,
            model: &str,
            prompt: &str,
            temperature: f32,
        ) -> anyhow::Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.generate_text(model, prompt, temperature).await
        }
    }

    #[tokio::test]
    async fn test_generate_unbuildable_request_is_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = CountingService {
            inner: PalmService::new(&Credential::new("k"), "http://exa mple.com").unwrap(),
            calls: Arc::clone(&calls),
        };

        // Default policy: a retried permanent failure would sleep for seconds
        let client = CompletionClient::new(service, RetryPolicy::default());
        let request =
            CompletionRequest::new("hello").with_model(Some(ModelDescriptor::named("m2")));
        let err = client.generate(&request).await.unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        match err {
            CompletionError::ServiceError(cause) => assert!(matches!(
                cause.downcast_ref::<NonRetryableError>(),
                Some(NonRetryableError::ClientError(_))
            )),
            other => panic!("Expected ServiceError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_generate_rejects_invalid_request_without_network() {
        let mut service = MockTextService::new();
        service.expect_list_models().times(0);
        service.expect_generate_text().times(0);

        let client = CompletionClient::new(service, fast_retry());

        let err = client
            .generate(&CompletionRequest::new(""))
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::InvalidRequest(_)));

        let err = client
            .generate(&CompletionRequest::new("hello").with_temperature(-0.1))
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_generate_missing_candidate_is_empty_text() {
        let mut service = MockTextService::new();
        service
            .expect_generate_text()
            .times(1)
            .returning(|_, _, _| Ok(None));

        let client = CompletionClient::new(service, fast_retry());
        let request =
            CompletionRequest::new("hello").with_model(Some(ModelDescriptor::named("m2")));

        assert_eq!(client.generate(&request).await.unwrap().text, "");
    }

    #[tokio::test]
    async fn test_generate_is_deterministic_at_zero_temperature() {
        let mut service = MockTextService::new();
        service.expect_list_models().times(2).returning(|| Ok(catalog()));
        service
            .expect_generate_text()
            .times(2)
            .returning(|model, prompt, temperature| {
                Ok(Some(format!("{}|{}|{}", model, prompt, temperature)))
            });

        let client = CompletionClient::new(service, fast_retry());
        let request = CompletionRequest::new("write a fibonacci function");

        let first = client.generate(&request).await.unwrap();
        let second = client.generate(&request).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_complete_delegates_to_generate() {
        let mut service = MockTextService::new();
        service
            .expect_generate_text()
            .times(1)
            .returning(|_, prompt, _| Ok(Some(prompt.to_uppercase())));

        let client = CompletionClient::new(service, fast_retry());
        let request = CompletionRequest::new("shout").with_model(Some(ModelDescriptor::named("m")));

        let result = client.complete(request).await.unwrap();
        assert_eq!(result.text, "SHOUT");
    }
}
