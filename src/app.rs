//! Composition root: wires Settings, the crypto envelope, the upstream
//! client, the model catalog, the key manager, the translators, the
//! server's `AppState`/router, and the proxy lifecycle controller.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use orp_core::crypto::CryptoEnvelope;
use orp_core::lifecycle::signal::SignalHandler;
use orp_core::settings::{self, SettingsStore};
use orp_catalog::ModelCatalog;
use orp_keymanager::KeyManager;
use orp_server::lifecycle::ProxyLifecycle;
use orp_upstream::UpstreamClient;

use crate::cli::RunArgs;

pub struct Application {
    settings: Arc<SettingsStore>,
    key_manager: Arc<KeyManager>,
    lifecycle: Arc<ProxyLifecycle>,
    force_proxy: bool,
}

impl Application {
    /// Builds every component explicitly — no service locator, per the
    /// redesign note favoring constructor injection throughout.
    pub async fn build(args: &RunArgs) -> anyhow::Result<Self> {
        let config_dir = args
            .config
            .as_ref()
            .map(PathBuf::from)
            .or_else(settings::default_config_dir)
            .ok_or_else(|| anyhow::anyhow!("could not resolve a config directory"))?;

        let crypto = Arc::new(CryptoEnvelope::load_or_init(&CryptoEnvelope::default_key_path(
            &config_dir,
        ))?);
        let settings_path = settings::default_settings_path(&config_dir);
        let settings = Arc::new(SettingsStore::load_or_init(settings_path, crypto)?);

        seed_from_env(&settings, "OPENROUTER_API_KEY", |s, v| {
            s.set_api_key_plaintext(v)
        })?;
        seed_from_env(&settings, "OPENROUTER_PROVISIONING_KEY", |s, v| {
            s.set_provisioning_key_plaintext(v)
        })?;

        let http = orp_core::http::build_http_client()?;
        let streaming_http = orp_core::http::build_streaming_http_client()?;
        let upstream = Arc::new(UpstreamClient::new(http, streaming_http));

        let catalog = Arc::new(ModelCatalog::new(upstream.clone()));
        let key_manager = Arc::new(KeyManager::new(upstream.clone(), settings.clone()));

        match key_manager.ensure().await {
            Ok(state) => tracing::info!(?state, "managed key ensured at startup"),
            Err(e) => tracing::warn!(error = %e, "managed key not ready at startup"),
        }

        let state = orp_server::AppState {
            settings: settings.clone(),
            upstream,
            catalog,
            key_manager: key_manager.clone(),
            start_time: Instant::now(),
        };
        let router = orp_server::build_router(state);

        let host = args.host.clone().unwrap_or_else(|| "0.0.0.0".to_string());
        let lifecycle = Arc::new(ProxyLifecycle::new(settings.clone(), router, host));

        Ok(Self {
            settings,
            key_manager,
            lifecycle,
            force_proxy: args.force_proxy(),
        })
    }

    /// Starts the proxy (if configured or forced) and blocks until a
    /// shutdown signal is received, then disposes gracefully (§4.J.5).
    pub async fn serve(self) -> anyhow::Result<()> {
        let Self {
            settings,
            key_manager,
            lifecycle,
            force_proxy,
        } = self;

        if force_proxy {
            lifecycle.force_start().await;
        } else if settings.snapshot().proxy_auto_start {
            lifecycle.start().await;
        } else {
            tracing::info!("proxyAutoStart is disabled; waiting for an explicit start");
        }

        let (signal_handler, mut shutdown_rx) = SignalHandler::new();
        let reload_settings = settings.clone();
        let reload_fn = move || {
            // No on-disk bootstrap config to reload; SIGHUP only revalidates
            // the managed key against the current Settings-backed value.
            let km = key_manager.clone();
            let settings = reload_settings.clone();
            tokio::spawn(async move {
                let _ = settings.snapshot();
                if let Err(e) = km.validate().await {
                    tracing::warn!(error = %e, "SIGHUP revalidation of the managed key failed");
                }
            });
        };

        tokio::spawn(signal_handler.run(reload_fn));
        let _ = shutdown_rx.changed().await;

        lifecycle.stop().await;
        tracing::info!("proxy disposed");
        Ok(())
    }
}

fn seed_from_env(
    settings: &SettingsStore,
    var: &str,
    set: impl FnOnce(&SettingsStore, &str) -> Result<(), anyhow::Error>,
) -> anyhow::Result<()> {
    if let Ok(value) = std::env::var(var)
        && !value.is_empty()
    {
        let already_configured = match var {
            "OPENROUTER_API_KEY" => !settings.api_key_plaintext().is_empty(),
            "OPENROUTER_PROVISIONING_KEY" => !settings.provisioning_key_plaintext().is_empty(),
            _ => false,
        };
        if !already_configured {
            set(settings, &value)?;
            tracing::info!(var, "seeded a credential from the environment");
        }
    }
    Ok(())
}
