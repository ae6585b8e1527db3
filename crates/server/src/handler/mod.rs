pub mod chat_completions;
pub mod engines;
pub mod health;
pub mod models;
