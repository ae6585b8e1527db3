//! TTL cache of the upstream model list, with curated/filtered/search
//! views used both by the proxy (capability checks, §4.G) and by the UI.

pub mod cache;
pub mod curated;

pub use cache::ModelCatalog;
pub use curated::curated_models;
