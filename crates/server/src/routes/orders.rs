//! Customer order lookup.

use axum::{
    Json,
    extract::{Path, State},
};

use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::order::Order;
use crate::services::orders::OrderService;
use crate::state::AppState;

/// GET /api/orders/{order_number}
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Path(order_number): Path<String>,
) -> Result<Json<Order>, AppError> {
    let order = OrderService::new(state.pool(), state.mail())
        .get_for_viewer(&order_number, &current)
        .await?;
    Ok(Json(order))
}
