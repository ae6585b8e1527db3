use orp_core::error::ProxyError;
use reqwest::{Client, Response};
use serde_json::Value;

use crate::result::ApiResult;
use crate::types::{ApiKeyRecord, CreatedKey, ModelInfo};

const BASE_URL: &str = "https://openrouter.ai/api/v1";
const APP_REFERER: &str = "https://github.com/openrouter-proxy";
const APP_TITLE: &str = "OpenRouter Proxy";

/// Stateless HTTP client for OpenRouter's REST API. Safe for concurrent
/// use; constructed once in the composition root and shared.
pub struct UpstreamClient {
    http: Client,
    streaming_http: Client,
    base_url: String,
}

impl UpstreamClient {
    pub fn new(http: Client, streaming_http: Client) -> Self {
        Self {
            http,
            streaming_http,
            base_url: BASE_URL.to_string(),
        }
    }

    /// Points this client at a custom gateway, e.g. a self-hosted
    /// OpenRouter-compatible endpoint or a test double.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authed(&self, req: reqwest::RequestBuilder, bearer: &str) -> reqwest::RequestBuilder {
        req.header("Authorization", format!("Bearer {bearer}"))
            .header("Content-Type", "application/json")
            .header("HTTP-Referer", APP_REFERER)
            .header("X-Title", APP_TITLE)
    }

    /// GET /key — current runtime key's label, usage, limit.
    pub async fn current_key_info(&self, api_key: &str) -> ApiResult<Value> {
        let req = self.authed(self.http.get(self.url("/key")), api_key);
        self.send_json(req).await
    }

    /// GET /keys — list of managed API keys.
    pub async fn list_keys(&self, provisioning_key: &str) -> ApiResult<Vec<ApiKeyRecord>> {
        let req = self.authed(self.http.get(self.url("/keys")), provisioning_key);
        self.send_json::<ListKeysResponse>(req).await.map_data(|r| r.data)
    }

    /// POST /keys `{name, limit?}` — the raw key is only ever returned here.
    pub async fn create_key(
        &self,
        provisioning_key: &str,
        name: &str,
        limit: Option<f64>,
    ) -> ApiResult<CreatedKey> {
        let body = serde_json::json!({ "name": name, "limit": limit });
        let req = self
            .authed(self.http.post(self.url("/keys")), provisioning_key)
            .json(&body);
        self.send_json(req).await
    }

    /// DELETE /keys/{hash}.
    pub async fn delete_key(&self, provisioning_key: &str, hash: &str) -> ApiResult<bool> {
        let req = self.authed(
            self.http.delete(self.url(&format!("/keys/{hash}"))),
            provisioning_key,
        );
        match self.send_raw(req).await {
            Ok(resp) if resp.status().is_success() => ApiResult::success(true, resp.status().as_u16()),
            Ok(resp) => {
                let status = resp.status().as_u16();
                let body = resp.text().await.unwrap_or_default();
                ApiResult::error_with_cause("delete key failed", Some(status), body)
            }
            Err(e) => ApiResult::error(e.to_string(), None),
        }
    }

    /// GET /credits.
    pub async fn credits(&self, api_key: &str) -> ApiResult<Value> {
        let req = self.authed(self.http.get(self.url("/credits")), api_key);
        self.send_json(req).await
    }

    /// GET /providers.
    pub async fn providers(&self, api_key: &str) -> ApiResult<Value> {
        let req = self.authed(self.http.get(self.url("/providers")), api_key);
        self.send_json(req).await
    }

    /// GET /models — catalog consumed by the model catalog cache.
    pub async fn models(&self) -> ApiResult<Vec<ModelInfo>> {
        let req = self.http.get(self.url("/models"));
        self.send_json::<ModelsResponse>(req).await.map_data(|r| r.data)
    }

    /// GET /activity — daily per-model rollups.
    pub async fn activity(&self, provisioning_key: &str) -> ApiResult<Value> {
        let req = self.authed(self.http.get(self.url("/activity")), provisioning_key);
        self.send_json(req).await
    }

    /// POST /chat/completions with `stream:false`.
    pub async fn chat_completions(&self, api_key: &str, body: &Value) -> ApiResult<Value> {
        let req = self
            .authed(self.http.post(self.url("/chat/completions")), api_key)
            .json(body);
        self.send_json(req).await
    }

    /// POST /chat/completions with `stream:true`. Returns the raw response
    /// so the streaming relay (§4.I) can forward bytes without this client
    /// buffering or re-parsing them.
    pub async fn chat_completions_stream(
        &self,
        api_key: &str,
        body: &Value,
    ) -> Result<Response, ProxyError> {
        let req = self
            .authed(self.streaming_http.post(self.url("/chat/completions")), api_key)
            .json(body);
        Ok(req.send().await?)
    }

    async fn send_raw(&self, req: reqwest::RequestBuilder) -> Result<Response, reqwest::Error> {
        req.send().await
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
    ) -> ApiResult<T> {
        let resp = match req.send().await {
            Ok(r) => r,
            Err(e) => return ApiResult::error(e.to_string(), None),
        };
        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return ApiResult::error_with_cause("upstream request failed", Some(status), body);
        }
        let text = match resp.text().await {
            Ok(t) => t,
            Err(e) => return ApiResult::error(e.to_string(), Some(status)),
        };
        match serde_json::from_str::<T>(&text) {
            Ok(data) => ApiResult::success(data, status),
            Err(e) => ApiResult::error_with_cause("malformed upstream response", Some(status), e.to_string()),
        }
    }
}

impl<T> ApiResult<T> {
    fn map_data<U>(self, f: impl FnOnce(T) -> U) -> ApiResult<U> {
        match self {
            ApiResult::Success { data, status_code } => ApiResult::Success {
                data: f(data),
                status_code,
            },
            ApiResult::Error {
                message,
                status_code,
                cause,
            } => ApiResult::Error {
                message,
                status_code,
                cause,
            },
        }
    }
}

#[derive(serde::Deserialize)]
struct ListKeysResponse {
    data: Vec<ApiKeyRecord>,
}

#[derive(serde::Deserialize)]
struct ModelsResponse {
    data: Vec<ModelInfo>,
}
