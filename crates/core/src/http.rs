use reqwest::Client;
use std::time::Duration;

/// Connection timeout for all upstream calls, per the upstream client's
/// contract (§4.C): ~30s to establish a connection.
const CONNECT_TIMEOUT_SECS: u64 = 30;
/// Read timeout for unary (non-streaming) calls: ~60s.
const READ_TIMEOUT_SECS: u64 = 60;

/// Build the shared HTTP client used to talk to OpenRouter. A single
/// client is constructed once in the composition root and reused —
/// it is stateless and safe for concurrent use.
pub fn build_http_client() -> Result<Client, anyhow::Error> {
    Ok(Client::builder()
        .user_agent(concat!("openrouter-proxy/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(READ_TIMEOUT_SECS))
        .build()?)
}

/// Build a client with no unary read timeout, for the streaming relay,
/// which instead enforces its own idle watchdog on the chunk stream.
pub fn build_streaming_http_client() -> Result<Client, anyhow::Error> {
    Ok(Client::builder()
        .user_agent(concat!("openrouter-proxy/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_without_error() {
        assert!(build_http_client().is_ok());
        assert!(build_streaming_http_client().is_ok());
    }
}
