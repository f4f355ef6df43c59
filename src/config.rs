use log::debug;
use reqwest::Url;
use std::fmt;
use std::path::PathBuf;

use crate::completion::DEFAULT_TEMPERATURE;
use crate::credential::DEFAULT_CREDENTIAL_FILE;
use crate::http::RetryPolicy;
use crate::palm::DEFAULT_ENDPOINT;
use crate::runtime::Runtime;

/// Environment variable that replaces the default service endpoint.
pub const ENDPOINT_ENV: &str = "GOOGLE_API_BASE";

/// Values given on the command line; `None` falls back to the environment or defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub key_file: Option<PathBuf>,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_attempts: Option<usize>,
}

/// Everything the session needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub credential_path: PathBuf,
    pub endpoint: String,
    /// Explicit model name; `None` means discover one from the catalog
    pub model: Option<String>,
    pub temperature: f32,
    pub retry: RetryPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credential_path: PathBuf::from(DEFAULT_CREDENTIAL_FILE),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: None,
            temperature: DEFAULT_TEMPERATURE,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    InvalidEndpoint { endpoint: String, reason: String },
    InvalidTemperature(f32),
    InvalidMaxAttempts,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidEndpoint { endpoint, reason } => {
                write!(f, "Invalid service endpoint '{}': {}", endpoint, reason)
            }
            ConfigError::InvalidTemperature(t) => {
                write!(f, "Temperature must be between 0.0 and 1.0, got {}", t)
            }
            ConfigError::InvalidMaxAttempts => {
                write!(f, "Maximum attempts must be at least 1")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Layers command-line overrides over the environment over defaults.
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime + ?Sized>(
        runtime: &R,
        overrides: ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(path) = overrides.key_file {
            config.credential_path = path;
        }

        let endpoint = overrides
            .endpoint
            .or_else(|| runtime.env_var(ENDPOINT_ENV).ok());
        if let Some(endpoint) = endpoint.as_deref().and_then(normalize_endpoint) {
            validate_endpoint(&endpoint)?;
            debug!("Using endpoint override {}", endpoint);
            config.endpoint = endpoint;
        }

        config.model = overrides
            .model
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());

        if let Some(temperature) = overrides.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err(ConfigError::InvalidTemperature(temperature));
            }
            config.temperature = temperature;
        }

        if let Some(max_attempts) = overrides.max_attempts {
            if max_attempts == 0 {
                return Err(ConfigError::InvalidMaxAttempts);
            }
            config.retry = config.retry.with_max_attempts(max_attempts);
        }

        Ok(config)
    }
}

/// Accepts a bare host ("localhost:8080") or a full URL; returns `None` for blank input.
pub fn normalize_endpoint(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.contains("://") {
        Some(trimmed.to_string())
    } else {
        Some(format!("https://{}", trimmed))
    }
}

/// Rejects endpoints no request could ever be sent to.
fn validate_endpoint(endpoint: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };

    let url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }
    Ok(())
}
