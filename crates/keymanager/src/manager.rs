use std::sync::Arc;

use orp_core::error::ProxyError;
use orp_core::settings::SettingsStore;
use orp_upstream::{ApiResult, UpstreamClient};
use tokio::sync::Mutex;

/// The well-known name of the key this core creates and owns.
pub const MANAGED_KEY_NAME: &str = "IDE Plugin Key";

/// Lifecycle state of the managed runtime API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Absent,
    Active,
    Stale,
    Deleted,
}

/// Manages the "managed" API key through provision → issue → validate →
/// regenerate, via a long-lived provisioning key. Ensure/Regenerate/Revoke
/// are serialized by `lock` so concurrent callers observe a single
/// effective transition (P8).
pub struct KeyManager {
    upstream: Arc<UpstreamClient>,
    settings: Arc<SettingsStore>,
    lock: Mutex<()>,
}

impl KeyManager {
    pub fn new(upstream: Arc<UpstreamClient>, settings: Arc<SettingsStore>) -> Self {
        Self {
            upstream,
            settings,
            lock: Mutex::new(()),
        }
    }

    /// List keys, adopt the managed record if a persisted plaintext exists
    /// for it, or create one if absent.
    pub async fn ensure(&self) -> Result<KeyState, ProxyError> {
        let _guard = self.lock.lock().await;
        self.ensure_locked().await
    }

    async fn ensure_locked(&self) -> Result<KeyState, ProxyError> {
        let provisioning_key = self.settings.provisioning_key_plaintext();
        if provisioning_key.is_empty() {
            return Err(ProxyError::NotConfigured(
                "provisioning key is not set".into(),
            ));
        }

        let managed_record = match self.upstream.list_keys(&provisioning_key).await {
            ApiResult::Success { data, .. } => {
                data.into_iter().find(|r| r.name == MANAGED_KEY_NAME)
            }
            ApiResult::Error { message, status_code, .. } => {
                return Err(upstream_error(message, status_code));
            }
        };

        let persisted_plaintext = self.settings.api_key_plaintext();

        match (managed_record, !persisted_plaintext.is_empty()) {
            (Some(record), true) => {
                // A listed record and a persisted plaintext aren't enough:
                // confirm the key upstream actually still accepts it before
                // the proxy starts serving requests with it (§4.E startup
                // validation).
                match self.upstream.current_key_info(&persisted_plaintext).await {
                    ApiResult::Success { .. } => {
                        tracing::info!("managed key validated against upstream, now active");
                        Ok(KeyState::Active)
                    }
                    ApiResult::Error { status_code: Some(401), .. } => {
                        tracing::warn!(
                            hash = %record.hash,
                            "managed key rejected by upstream at startup, regenerating"
                        );
                        self.regenerate_locked(Some(record.hash)).await
                    }
                    ApiResult::Error { message, status_code, .. } => {
                        Err(upstream_error(message, status_code))
                    }
                }
            }
            (Some(record), false) => {
                tracing::warn!(
                    hash = %record.hash,
                    "managed key record exists but plaintext was lost, regenerating"
                );
                self.regenerate_locked(Some(record.hash)).await
            }
            (None, _) => {
                tracing::info!("no managed key found, creating one");
                self.create_and_persist(&provisioning_key).await
            }
        }
    }

    /// Calls `/key` with the persisted runtime key. Success transitions to
    /// Active; a 401 transitions to Stale.
    pub async fn validate(&self) -> Result<KeyState, ProxyError> {
        let api_key = self.settings.api_key_plaintext();
        if api_key.is_empty() {
            return Ok(KeyState::Absent);
        }
        match self.upstream.current_key_info(&api_key).await {
            ApiResult::Success { .. } => Ok(KeyState::Active),
            ApiResult::Error { status_code: Some(401), .. } => Ok(KeyState::Stale),
            ApiResult::Error { message, status_code, .. } => Err(upstream_error(message, status_code)),
        }
    }

    /// Deletes the stale record (best effort) and issues a replacement,
    /// persisting the new plaintext.
    pub async fn regenerate(&self) -> Result<KeyState, ProxyError> {
        let _guard = self.lock.lock().await;
        self.regenerate_locked(None).await
    }

    async fn regenerate_locked(&self, known_hash: Option<String>) -> Result<KeyState, ProxyError> {
        let provisioning_key = self.settings.provisioning_key_plaintext();
        if provisioning_key.is_empty() {
            return Err(ProxyError::NotConfigured(
                "provisioning key is not set".into(),
            ));
        }

        let hash = match known_hash {
            Some(h) => Some(h),
            None => self.find_managed_hash(&provisioning_key).await?,
        };

        if let Some(hash) = hash {
            match self.upstream.delete_key(&provisioning_key, &hash).await {
                ApiResult::Success { .. } => {}
                ApiResult::Error { message, .. } => {
                    tracing::warn!(error = %message, "best-effort delete of stale key failed");
                }
            }
        }

        self.create_and_persist(&provisioning_key).await
    }

    /// Deletes the managed key and clears the persisted plaintext.
    pub async fn revoke(&self) -> Result<(), ProxyError> {
        let _guard = self.lock.lock().await;
        let provisioning_key = self.settings.provisioning_key_plaintext();
        if provisioning_key.is_empty() {
            self.settings
                .set_api_key_plaintext("")
                .map_err(|e| ProxyError::Internal(e.to_string()))?;
            return Ok(());
        }

        if let Some(hash) = self.find_managed_hash(&provisioning_key).await? {
            match self.upstream.delete_key(&provisioning_key, &hash).await {
                ApiResult::Success { .. } => {}
                ApiResult::Error { message, .. } => {
                    tracing::warn!(error = %message, "delete of managed key failed during revoke");
                }
            }
        }

        self.settings
            .set_api_key_plaintext("")
            .map_err(|e| ProxyError::Internal(e.to_string()))?;
        tracing::info!("managed key revoked");
        Ok(())
    }

    async fn find_managed_hash(&self, provisioning_key: &str) -> Result<Option<String>, ProxyError> {
        match self.upstream.list_keys(provisioning_key).await {
            ApiResult::Success { data, .. } => {
                Ok(data.into_iter().find(|r| r.name == MANAGED_KEY_NAME).map(|r| r.hash))
            }
            ApiResult::Error { message, status_code, .. } => Err(upstream_error(message, status_code)),
        }
    }

    async fn create_and_persist(&self, provisioning_key: &str) -> Result<KeyState, ProxyError> {
        match self
            .upstream
            .create_key(provisioning_key, MANAGED_KEY_NAME, None)
            .await
        {
            ApiResult::Success { data, .. } => {
                self.settings
                    .set_api_key_plaintext(&data.key)
                    .map_err(|e| ProxyError::Internal(e.to_string()))?;
                tracing::info!(hash = %data.data.hash, "managed key created and persisted");
                Ok(KeyState::Active)
            }
            ApiResult::Error { message, status_code, .. } => Err(upstream_error(message, status_code)),
        }
    }
}

fn upstream_error(message: String, status_code: Option<u16>) -> ProxyError {
    match status_code {
        Some(401) => ProxyError::Unauthorized(message),
        Some(status) => ProxyError::UpstreamError { status, body: message },
        None => ProxyError::NetworkError(message),
    }
}
