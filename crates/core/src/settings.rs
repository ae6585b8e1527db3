//! Typed, encrypted-at-rest settings store. A single JSON document is the
//! source of truth; in-memory readers go through an `ArcSwap` snapshot that
//! is swapped on every write-through mutation.

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::crypto::CryptoEnvelope;

/// REGULAR = user-provided API key only; EXTENDED = user-provided
/// provisioning key, which issues runtime API keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuthScope {
    #[default]
    Regular,
    Extended,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub auth_scope: AuthScope,
    /// Ciphertext (or empty). Decrypted on read via the crypto envelope.
    pub api_key: String,
    /// Ciphertext (or empty).
    pub provisioning_key: String,
    pub favorite_models: Vec<String>,
    pub proxy_port: u16,
    pub proxy_port_range_start: u16,
    pub proxy_port_range_end: u16,
    pub proxy_auto_start: bool,
    pub auto_refresh: bool,
    pub refresh_interval_secs: u64,
    pub show_costs: bool,
    pub track_generations: bool,
    pub max_tracked_generations: usize,
    /// 0 = unset.
    pub default_max_tokens: u32,
    pub has_seen_welcome: bool,
    pub has_completed_setup: bool,
    pub last_seen_version: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auth_scope: AuthScope::default(),
            api_key: String::new(),
            provisioning_key: String::new(),
            favorite_models: Vec::new(),
            proxy_port: 0,
            proxy_port_range_start: 8317,
            proxy_port_range_end: 8325,
            proxy_auto_start: true,
            auto_refresh: true,
            refresh_interval_secs: 900,
            show_costs: true,
            track_generations: true,
            max_tracked_generations: 200,
            default_max_tokens: 0,
            has_seen_welcome: false,
            has_completed_setup: false,
            last_seen_version: String::new(),
        }
    }
}

impl Settings {
    fn validate(&self) -> Result<(), anyhow::Error> {
        if !(1024..=65535).contains(&self.proxy_port_range_start)
            || !(1024..=65535).contains(&self.proxy_port_range_end)
        {
            anyhow::bail!("proxy port range endpoints must fall within [1024, 65535]");
        }
        if self.proxy_port_range_start > self.proxy_port_range_end {
            anyhow::bail!("proxy_port_range_start must be <= proxy_port_range_end");
        }
        if self.favorite_models.iter().any(|m| m.trim().is_empty()) {
            anyhow::bail!("favoriteModels entries must be non-blank");
        }
        Ok(())
    }
}

/// Fired after every successful mutation; `field` names the setter that
/// ran. Subscribers are async and not guaranteed any re-entrancy ordering.
#[derive(Debug, Clone)]
pub struct SettingsChanged {
    pub field: &'static str,
}

/// Process-wide singleton owning the persisted Settings document.
pub struct SettingsStore {
    path: PathBuf,
    crypto: Arc<CryptoEnvelope>,
    current: ArcSwap<Settings>,
    changes: broadcast::Sender<SettingsChanged>,
}

impl SettingsStore {
    /// Loads `path` if it exists and is valid JSON; otherwise initializes
    /// defaults and persists them immediately.
    pub fn load_or_init(path: PathBuf, crypto: Arc<CryptoEnvelope>) -> Result<Self, anyhow::Error> {
        let settings = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            let settings: Settings = serde_json::from_str(&raw)?;
            settings.validate()?;
            settings
        } else {
            Settings::default()
        };

        let (changes, _) = broadcast::channel(32);
        let store = Self {
            path,
            crypto,
            current: ArcSwap::from_pointee(settings),
            changes,
        };
        if !store.path.exists() {
            store.persist()?;
        }
        Ok(store)
    }

    /// Current snapshot. Cheap: an `Arc` clone of the last swapped value.
    pub fn snapshot(&self) -> Arc<Settings> {
        self.current.load_full()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SettingsChanged> {
        self.changes.subscribe()
    }

    fn mutate(
        &self,
        field: &'static str,
        f: impl FnOnce(&mut Settings),
    ) -> Result<(), anyhow::Error> {
        let mut next = (*self.current.load_full()).clone();
        f(&mut next);
        next.validate()?;
        self.current.store(Arc::new(next));
        self.persist()?;
        let _ = self.changes.send(SettingsChanged { field });
        tracing::info!(field, "settings mutated");
        Ok(())
    }

    fn persist(&self) -> Result<(), anyhow::Error> {
        let snapshot = self.current.load_full();
        let json = serde_json::to_vec_pretty(&*snapshot)?;
        let tmp = self.path.with_extension("tmp");
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    // ─── Typed getters ──────────────────────────────────────────────────

    pub fn auth_scope(&self) -> AuthScope {
        self.current.load().auth_scope
    }

    /// Decrypts the runtime API key. Empty if unset.
    pub fn api_key_plaintext(&self) -> String {
        let ciphertext = self.current.load().api_key.clone();
        if ciphertext.is_empty() {
            return String::new();
        }
        if CryptoEnvelope::is_encrypted(&ciphertext) {
            self.crypto.decrypt(&ciphertext)
        } else {
            // Legacy plaintext, accepted for one migration cycle.
            ciphertext
        }
    }

    /// Decrypts the provisioning key. Empty if unset.
    pub fn provisioning_key_plaintext(&self) -> String {
        let ciphertext = self.current.load().provisioning_key.clone();
        if ciphertext.is_empty() {
            return String::new();
        }
        if CryptoEnvelope::is_encrypted(&ciphertext) {
            self.crypto.decrypt(&ciphertext)
        } else {
            ciphertext
        }
    }

    // ─── Typed setters (write-through) ─────────────────────────────────

    pub fn set_auth_scope(&self, scope: AuthScope) -> Result<(), anyhow::Error> {
        self.mutate("auth_scope", |s| s.auth_scope = scope)
    }

    pub fn set_api_key_plaintext(&self, plaintext: &str) -> Result<(), anyhow::Error> {
        let ciphertext = if plaintext.is_empty() {
            String::new()
        } else {
            self.crypto.encrypt(plaintext)
        };
        self.mutate("api_key", |s| s.api_key = ciphertext)
    }

    pub fn set_provisioning_key_plaintext(&self, plaintext: &str) -> Result<(), anyhow::Error> {
        let ciphertext = if plaintext.is_empty() {
            String::new()
        } else {
            self.crypto.encrypt(plaintext)
        };
        self.mutate("provisioning_key", |s| s.provisioning_key = ciphertext)
    }

    pub fn set_favorite_models(&self, models: Vec<String>) -> Result<(), anyhow::Error> {
        let mut seen = std::collections::HashSet::new();
        let deduped: Vec<String> = models
            .into_iter()
            .filter(|m| !m.trim().is_empty() && seen.insert(m.clone()))
            .collect();
        self.mutate("favorite_models", |s| s.favorite_models = deduped)
    }

    pub fn set_proxy_port(&self, port: u16) -> Result<(), anyhow::Error> {
        self.mutate("proxy_port", |s| s.proxy_port = port)
    }

    pub fn set_proxy_port_range(&self, start: u16, end: u16) -> Result<(), anyhow::Error> {
        self.mutate("proxy_port_range", |s| {
            s.proxy_port_range_start = start;
            s.proxy_port_range_end = end;
        })
    }

    pub fn set_proxy_auto_start(&self, enabled: bool) -> Result<(), anyhow::Error> {
        self.mutate("proxy_auto_start", |s| s.proxy_auto_start = enabled)
    }

    pub fn set_auto_refresh(&self, enabled: bool) -> Result<(), anyhow::Error> {
        self.mutate("auto_refresh", |s| s.auto_refresh = enabled)
    }

    pub fn set_refresh_interval_secs(&self, secs: u64) -> Result<(), anyhow::Error> {
        self.mutate("refresh_interval_secs", |s| s.refresh_interval_secs = secs)
    }

    pub fn set_show_costs(&self, enabled: bool) -> Result<(), anyhow::Error> {
        self.mutate("show_costs", |s| s.show_costs = enabled)
    }

    pub fn set_track_generations(&self, enabled: bool) -> Result<(), anyhow::Error> {
        self.mutate("track_generations", |s| s.track_generations = enabled)
    }

    pub fn set_max_tracked_generations(&self, max: usize) -> Result<(), anyhow::Error> {
        self.mutate("max_tracked_generations", |s| s.max_tracked_generations = max)
    }

    pub fn set_default_max_tokens(&self, tokens: u32) -> Result<(), anyhow::Error> {
        self.mutate("default_max_tokens", |s| s.default_max_tokens = tokens)
    }

    pub fn mark_setup_complete(&self) -> Result<(), anyhow::Error> {
        self.mutate("has_completed_setup", |s| s.has_completed_setup = true)
    }

    pub fn mark_welcome_seen(&self) -> Result<(), anyhow::Error> {
        self.mutate("has_seen_welcome", |s| s.has_seen_welcome = true)
    }

    pub fn set_last_seen_version(&self, version: String) -> Result<(), anyhow::Error> {
        self.mutate("last_seen_version", |s| s.last_seen_version = version)
    }
}

/// Resolves the default directory for persisted state (the Settings
/// document and the machine-local crypto key), under the host's config
/// directory.
pub fn default_config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "openrouter-proxy")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

pub fn default_settings_path(config_dir: &Path) -> PathBuf {
    config_dir.join("settings.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store() -> (tempfile::TempDir, SettingsStore) {
        let dir = tempdir().unwrap();
        let crypto = Arc::new(CryptoEnvelope::load_or_init(&CryptoEnvelope::default_key_path(dir.path())).unwrap());
        let store = SettingsStore::load_or_init(dir.path().join("settings.json"), crypto).unwrap();
        (dir, store)
    }

    #[test]
    fn defaults_are_valid_and_persisted() {
        let (dir, _store) = store();
        assert!(dir.path().join("settings.json").exists());
    }

    #[test]
    fn api_key_round_trips_through_encryption() {
        let (_dir, store) = store();
        assert_eq!(store.api_key_plaintext(), "");
        store.set_api_key_plaintext("sk-or-v1-test").unwrap();
        assert_eq!(store.api_key_plaintext(), "sk-or-v1-test");
        // Persisted ciphertext must not be the plaintext.
        assert_ne!(store.snapshot().api_key, "sk-or-v1-test");
        assert!(CryptoEnvelope::is_encrypted(&store.snapshot().api_key));
    }

    #[test]
    fn favorite_models_are_deduped_and_non_blank() {
        let (_dir, store) = store();
        store
            .set_favorite_models(vec![
                "openai/gpt-4o".into(),
                "openai/gpt-4o".into(),
                "  ".into(),
                "anthropic/claude-3.5-sonnet".into(),
            ])
            .unwrap();
        assert_eq!(
            store.snapshot().favorite_models,
            vec!["openai/gpt-4o".to_string(), "anthropic/claude-3.5-sonnet".to_string()]
        );
    }

    #[test]
    fn invalid_port_range_is_rejected() {
        let (_dir, store) = store();
        assert!(store.set_proxy_port_range(500, 600).is_err());
        assert!(store.set_proxy_port_range(9000, 8000).is_err());
        assert!(store.set_proxy_port_range(9000, 9010).is_ok());
    }

    #[test]
    fn mutation_emits_change_notification() {
        let (_dir, store) = store();
        let mut rx = store.subscribe();
        store.set_proxy_auto_start(false).unwrap();
        let event = rx.try_recv().expect("expected a change event");
        assert_eq!(event.field, "proxy_auto_start");
    }

    #[test]
    fn remaining_fields_have_working_setters() {
        let (_dir, store) = store();
        store.set_auto_refresh(false).unwrap();
        store.set_refresh_interval_secs(120).unwrap();
        store.set_show_costs(false).unwrap();
        store.set_track_generations(false).unwrap();
        store.set_max_tracked_generations(50).unwrap();

        let snapshot = store.snapshot();
        assert!(!snapshot.auto_refresh);
        assert_eq!(snapshot.refresh_interval_secs, 120);
        assert!(!snapshot.show_costs);
        assert!(!snapshot.track_generations);
        assert_eq!(snapshot.max_tracked_generations, 50);
    }

    #[test]
    fn settings_reload_preserves_mutations() {
        let dir = tempdir().unwrap();
        let crypto = Arc::new(CryptoEnvelope::load_or_init(&CryptoEnvelope::default_key_path(dir.path())).unwrap());
        let path = dir.path().join("settings.json");

        {
            let store = SettingsStore::load_or_init(path.clone(), crypto.clone()).unwrap();
            store.set_api_key_plaintext("sk-or-v1-persisted").unwrap();
        }

        let reloaded = SettingsStore::load_or_init(path, crypto).unwrap();
        assert_eq!(reloaded.api_key_plaintext(), "sk-or-v1-persisted");
    }
}
