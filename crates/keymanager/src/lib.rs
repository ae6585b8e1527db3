//! Provision → issue → validate → regenerate lifecycle for the managed
//! OpenRouter runtime API key (§4.E).

pub mod manager;

pub use manager::{KeyManager, KeyState, MANAGED_KEY_NAME};
