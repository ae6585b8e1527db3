use serde::{Deserialize, Serialize};

/// Cached upstream model record (§3 `ModelInfo`). This is the canonical
/// shape; no legacy duplicate is carried.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub created: i64,
    pub description: String,
    pub context_length: u64,
    pub architecture: Architecture,
    pub pricing: Pricing,
    pub top_provider: TopProvider,
    pub supported_parameters: Vec<String>,
}

impl Default for ModelInfo {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            created: 0,
            description: String::new(),
            context_length: 0,
            architecture: Architecture::default(),
            pricing: Pricing::default(),
            top_provider: TopProvider::default(),
            supported_parameters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Architecture {
    pub input_modalities: Vec<String>,
    pub output_modalities: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Pricing {
    pub prompt: String,
    pub completion: String,
    pub image: String,
    pub request: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TopProvider {
    pub context_length: Option<u64>,
    pub max_completion_tokens: Option<u64>,
    pub is_moderated: bool,
}

/// OpenRouter-managed key listing entry.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiKeyRecord {
    /// Stable identifier used for delete/regenerate operations.
    pub hash: String,
    pub name: String,
    /// Masked key prefix, e.g. "sk-or-v1-...abcd".
    pub label: String,
    pub disabled: bool,
    pub limit: Option<f64>,
    pub usage: f64,
    pub created_at: String,
    pub updated_at: String,
}

/// Response to key creation, the only point at which the raw key is
/// returned by the upstream.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedKey {
    pub data: ApiKeyRecord,
    pub key: String,
}

/// Drives UI and internal health reporting; computed from last probe
/// outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionStatus {
    Ready,
    Connecting,
    Error,
    NotConfigured,
    Offline,
}
