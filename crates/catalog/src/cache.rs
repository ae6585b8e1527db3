use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use orp_upstream::{ModelInfo, UpstreamClient};

use crate::curated::curated_models;

/// TTL after which a cached model list is considered stale and refetched
/// on the next read (§4.D: ~15 minutes).
const CACHE_TTL: Duration = Duration::from_secs(15 * 60);
/// Bound on how long a caller waits for the very first population.
const FIRST_POPULATION_TIMEOUT: Duration = Duration::from_secs(30);

/// TTL cache of the upstream model list, with curated/filtered/search
/// views. `moka`'s `get_with` coalesces concurrent refreshes into a single
/// upstream fetch (P10).
pub struct ModelCatalog {
    upstream: Arc<UpstreamClient>,
    cache: Cache<(), Arc<Vec<ModelInfo>>>,
}

impl ModelCatalog {
    pub fn new(upstream: Arc<UpstreamClient>) -> Self {
        Self {
            upstream,
            cache: Cache::builder().time_to_live(CACHE_TTL).max_capacity(1).build(),
        }
    }

    /// The full cached list, refetching if older than the TTL or absent.
    /// Concurrent callers never trigger duplicate upstream fetches.
    pub async fn all(&self) -> Arc<Vec<ModelInfo>> {
        let upstream = self.upstream.clone();
        let fetch = async move {
            match upstream.models().await {
                orp_upstream::ApiResult::Success { data, .. } => {
                    tracing::info!(count = data.len(), "model catalog refreshed");
                    Arc::new(data)
                }
                orp_upstream::ApiResult::Error { message, .. } => {
                    tracing::error!(error = %message, "model catalog refresh failed, serving curated fallback");
                    Arc::new(curated_models())
                }
            }
        };

        match tokio::time::timeout(FIRST_POPULATION_TIMEOUT, self.cache.get_with((), fetch)).await
        {
            Ok(list) => list,
            Err(_) => {
                tracing::warn!("model catalog population timed out, serving curated fallback");
                Arc::new(curated_models())
            }
        }
    }

    /// Fixed, hard-coded popular-models list; always available even when
    /// upstream is unreachable.
    pub fn curated(&self) -> Vec<ModelInfo> {
        curated_models()
    }

    /// Filter cached (or freshly fetched) models whose `id` has the prefix
    /// `"<slug>/"`.
    pub async fn by_provider(&self, slug: &str) -> Vec<ModelInfo> {
        let prefix = format!("{slug}/");
        self.all()
            .await
            .iter()
            .filter(|m| m.id.starts_with(&prefix))
            .cloned()
            .collect()
    }

    /// Case-insensitive substring match on `id` and `name`.
    pub async fn search(&self, query: &str) -> Vec<ModelInfo> {
        let needle = query.to_lowercase();
        self.all()
            .await
            .iter()
            .filter(|m| m.id.to_lowercase().contains(&needle) || m.name.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    /// Point lookup against whatever is currently cached, without
    /// triggering a fetch. Returns `None` if uncached — callers (the
    /// multimodal validator) treat this as fail-open.
    pub async fn by_id(&self, id: &str) -> Option<ModelInfo> {
        let cached = self.cache.get(&()).await?;
        cached.iter().find(|m| m.id == id).cloned()
    }

    /// Explicit invalidation, e.g. after a provisioning event.
    pub async fn invalidate(&self) {
        self.cache.invalidate(&()).await;
    }
}
