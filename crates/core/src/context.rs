use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use rand::Rng;

static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generates an opaque `X-Request-Id`: a monotonically increasing counter
/// combined with a random suffix so ids are unguessable but still order
/// requests for log correlation.
fn next_request_id() -> String {
    let seq = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    let salt: u32 = rand::rng().random();
    format!("req_{seq:012x}{salt:08x}")
}

/// Per-request context carrying metadata for logging and auditing.
/// Injected as an axum `Extension` by the server's request-context layer.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Opaque, monotonic+random request identifier.
    pub request_id: String,
    /// When the request was received.
    pub start_time: Instant,
    /// Client IP address, if available.
    pub client_ip: Option<String>,
}

impl RequestContext {
    pub fn new(client_ip: Option<String>) -> Self {
        Self {
            request_id: next_request_id(),
            start_time: Instant::now(),
            client_ip,
        }
    }

    /// Returns elapsed time since request start.
    pub fn elapsed_ms(&self) -> u128 {
        self.start_time.elapsed().as_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_are_monotonic_and_unique() {
        let a = RequestContext::new(None);
        let b = RequestContext::new(None);
        assert_ne!(a.request_id, b.request_id);
        assert!(a.request_id.starts_with("req_"));
        assert!(b.request_id.starts_with("req_"));
    }

    #[test]
    fn elapsed_ms_progresses() {
        let ctx = RequestContext::new(Some("127.0.0.1".into()));
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(ctx.elapsed_ms() >= 5);
    }
}
