//! CLI argument parsing for the proxy's composition root.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "openrouter-proxy", version, about = "OpenAI-compatible proxy to OpenRouter")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the proxy server (default when no subcommand is given).
    Run(RunArgs),
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the settings directory (holds settings.json and crypto.key).
    #[arg(long, env = "OPENROUTER_PROXY_CONFIG_DIR")]
    pub config: Option<String>,

    /// Listen host override.
    #[arg(long, env = "OPENROUTER_PROXY_HOST")]
    pub host: Option<String>,

    /// Force the proxy to start regardless of `proxyAutoStart`/configured
    /// state. Equivalent to `FORCE_PROXY=true`.
    #[arg(long)]
    pub proxy_server: bool,

    /// Log level passed to the tracing env-filter.
    #[arg(long, default_value = "info", env = "OPENROUTER_PROXY_LOG_LEVEL")]
    pub log_level: String,
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            config: None,
            host: None,
            proxy_server: false,
            log_level: "info".to_string(),
        }
    }
}

impl RunArgs {
    /// `--proxy-server` or `FORCE_PROXY=true` both force the proxy to
    /// start, per §4.L.
    pub fn force_proxy(&self) -> bool {
        self.proxy_server
            || std::env::var("FORCE_PROXY")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false)
    }
}
