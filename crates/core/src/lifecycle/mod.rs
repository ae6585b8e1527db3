//! Process-level ambient concerns: log initialization and signal handling.
//! The proxy server's own start/stop/restart lifecycle lives in `orp-server`
//! — this module only covers the embedding process, not the core itself.

pub mod logging;
pub mod signal;
