use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use orp_core::error::ProxyError;

use crate::AppState;

/// Legacy `/engines` compatibility endpoint: same content as `/models`,
/// wrapped in the older `{data: [...]}` engine shape.
pub async fn list_engines(State(state): State<AppState>) -> Result<impl IntoResponse, ProxyError> {
    let models = state.catalog.all().await;
    Ok(Json(orp_translator::translate_engines_list(&models)))
}
