//! Site settings editor.

use std::collections::BTreeMap;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
};
use serde_json::Value as JsonValue;
use tracing::instrument;

use spareline_core::Permission;

use crate::error::AppError;
use crate::middleware::StaffUser;
use crate::models::setting::Setting;
use crate::state::AppState;

/// Build the settings router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/settings", get(list).put(update))
        .route("/settings/{key}", delete(remove))
}

async fn list(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Setting>>, AppError> {
    user.require(Permission::ManageSettings)?;
    Ok(Json(state.settings().all().await?))
}

/// Bulk upsert. Returns the full settings list afterwards.
#[instrument(skip_all, fields(staff_id = %user.id))]
async fn update(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    Json(entries): Json<BTreeMap<String, JsonValue>>,
) -> Result<Json<Vec<Setting>>, AppError> {
    user.require(Permission::ManageSettings)?;
    let keys: Vec<String> = entries.keys().cloned().collect();
    state.settings().update(entries).await?;
    tracing::info!(?keys, "Settings updated");
    Ok(Json(state.settings().all().await?))
}

#[instrument(skip_all, fields(staff_id = %user.id, key = %key))]
async fn remove(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<StatusCode, AppError> {
    user.require(Permission::ManageSettings)?;
    state.settings().delete(&key).await?;
    tracing::info!("Setting deleted");
    Ok(StatusCode::NO_CONTENT)
}
