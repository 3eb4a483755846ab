//! Public site settings.

use std::collections::BTreeMap;

use axum::{Json, extract::State};
use serde_json::Value as JsonValue;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/settings
pub async fn public(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<String, JsonValue>>, AppError> {
    let settings = state.settings().public().await?;
    Ok(Json(settings.as_ref().clone()))
}
