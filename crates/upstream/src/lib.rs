//! HTTP client for OpenRouter's REST API (`https://openrouter.ai/api/v1`).

pub mod client;
pub mod result;
pub mod types;

pub use client::UpstreamClient;
pub use result::ApiResult;
pub use types::{ApiKeyRecord, Architecture, ConnectionStatus, CreatedKey, ModelInfo, Pricing, TopProvider};
