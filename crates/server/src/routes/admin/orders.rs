//! Order fulfilment.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use serde::Deserialize;

use spareline_core::{OrderId, OrderStatus, Permission};

use crate::error::AppError;
use crate::middleware::StaffUser;
use crate::models::order::{Order, OrderStatusChange};
use crate::models::{Page, Pagination};
use crate::services::orders::OrderService;
use crate::state::AppState;

/// Build the order fulfilment router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list))
        .route("/orders/{id}", get(show))
        .route("/orders/{id}/status", post(update_status))
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Deserialize)]
pub struct StatusChangeRequest {
    pub status: OrderStatus,
    #[serde(default)]
    pub payment_reference: Option<String>,
    #[serde(default)]
    pub tracking_number: Option<String>,
}

async fn list(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Page<Order>>, AppError> {
    user.require(Permission::ManageOrders)?;
    let page = OrderService::new(state.pool(), state.mail())
        .list(query.status, pagination)
        .await?;
    Ok(Json(page))
}

async fn show(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>, AppError> {
    user.require(Permission::ManageOrders)?;
    Ok(Json(OrderService::new(state.pool(), state.mail()).get(id).await?))
}

async fn update_status(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(req): Json<StatusChangeRequest>,
) -> Result<Json<Order>, AppError> {
    user.require(Permission::ManageOrders)?;
    let order = OrderService::new(state.pool(), state.mail())
        .update_status(
            id,
            OrderStatusChange {
                status: req.status,
                payment_reference: req.payment_reference,
                tracking_number: req.tracking_number,
            },
        )
        .await?;
    tracing::info!(staff_id = %user.id, order = %order.order_number, status = order.status.as_str(), "Order status changed");
    Ok(Json(order))
}
