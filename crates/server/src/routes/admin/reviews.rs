//! Review moderation.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use serde::Deserialize;
use tracing::instrument;

use spareline_core::{Permission, ReviewId};

use crate::db::ReviewRepository;
use crate::error::AppError;
use crate::middleware::StaffUser;
use crate::models::catalog::Review;
use crate::state::AppState;

/// Build the moderation router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/reviews", get(list))
        .route("/reviews/{id}", delete(remove))
        .route("/reviews/{id}/approve", post(approve))
}

#[derive(Debug, Deserialize)]
pub struct ModerationQuery {
    /// Omit for every review, `false` for the moderation queue.
    pub approved: Option<bool>,
}

async fn list(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    Query(query): Query<ModerationQuery>,
) -> Result<Json<Vec<Review>>, AppError> {
    user.require(Permission::ModerateReviews)?;
    let reviews = ReviewRepository::new(state.pool())
        .list_for_moderation(query.approved)
        .await?;
    Ok(Json(reviews))
}

#[instrument(skip_all, fields(staff_id = %user.id, review_id = %id))]
async fn approve(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    Path(id): Path<ReviewId>,
) -> Result<Json<Review>, AppError> {
    user.require(Permission::ModerateReviews)?;
    let review = ReviewRepository::new(state.pool()).approve(id).await?;
    tracing::info!("Review approved");
    Ok(Json(review))
}

#[instrument(skip_all, fields(staff_id = %user.id, review_id = %id))]
async fn remove(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    Path(id): Path<ReviewId>,
) -> Result<StatusCode, AppError> {
    user.require(Permission::ModerateReviews)?;
    ReviewRepository::new(state.pool()).delete(id).await?;
    tracing::info!("Review deleted");
    Ok(StatusCode::NO_CONTENT)
}
