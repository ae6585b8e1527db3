pub mod models;
pub mod multimodal;
pub mod request;
pub mod response;
pub mod validate;

pub use models::{translate_engines_list, translate_models_list};
pub use multimodal::validate_multimodal;
pub use request::translate_request;
pub use response::translate_response;
pub use validate::validate_request;
