use serde::{Deserialize, Serialize};

/// Generation method a model must advertise to be picked for text completion.
pub const TEXT_GENERATION_METHOD: &str = "generateText";

/// A model catalog entry
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescriptor {
    /// Resource name, e.g. "models/text-bison-001"
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

impl ModelDescriptor {
    /// Descriptor for a model chosen by name; the "models/" prefix is optional.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        let name = if name.starts_with("models/") {
            name
        } else {
            format!("models/{}", name)
        };
        Self {
            name,
            ..Default::default()
        }
    }

    pub fn supports_text_generation(&self) -> bool {
        self.supported_generation_methods
            .iter()
            .any(|m| m == TEXT_GENERATION_METHOD)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListModelsResponse {
    #[serde(default)]
    pub models: Vec<ModelDescriptor>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateTextRequest<'a> {
    pub prompt: TextPrompt<'a>,
    pub temperature: f32,
    pub candidate_count: u32,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TextPrompt<'a> {
    pub text: &'a str,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct GenerateTextResponse {
    #[serde(default)]
    pub candidates: Vec<TextCompletion>,
    /// Why candidates were dropped, when they were
    #[serde(default)]
    pub filters: Vec<ContentFilter>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct TextCompletion {
    #[serde(default)]
    pub output: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct ContentFilter {
    pub reason: Option<String>,
    pub message: Option<String>,
}

/// Error envelope returned with non-2xx responses
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ApiErrorResponse {
    pub error: ApiError,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ApiError {
    pub code: Option<u16>,
    #[serde(default)]
    pub message: String,
    pub status: Option<String>,
}
