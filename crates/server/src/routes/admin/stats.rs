//! Dashboard statistics.

use std::collections::BTreeMap;

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use spareline_core::Permission;

use crate::db::stats::{ProductCounts, Revenue};
use crate::db::{OrderRepository, StatsRepository};
use crate::error::AppError;
use crate::middleware::StaffUser;
use crate::models::order::Order;
use crate::state::AppState;

const RECENT_ORDERS: i64 = 5;

/// Build the stats router.
pub fn router() -> Router<AppState> {
    Router::new().route("/stats", get(dashboard))
}

/// Everything the dashboard shows in one payload.
#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub products: ProductCounts,
    pub customers: i64,
    pub quotes_by_status: BTreeMap<&'static str, i64>,
    pub orders_by_status: BTreeMap<&'static str, i64>,
    pub revenue: Revenue,
    pub open_chats: i64,
    pub recent_orders: Vec<Order>,
}

async fn dashboard(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
) -> Result<Json<DashboardStats>, AppError> {
    user.require(Permission::ViewStats)?;
    let stats = StatsRepository::new(state.pool());
    let orders = OrderRepository::new(state.pool());

    let (products, customers, quotes_by_status, orders_by_status, revenue, open_chats, recent_orders) =
        tokio::try_join!(
            stats.product_counts(),
            stats.customer_count(),
            stats.quotes_by_status(),
            stats.orders_by_status(),
            stats.revenue(),
            stats.open_chats(),
            orders.recent(RECENT_ORDERS),
        )?;

    Ok(Json(DashboardStats {
        products,
        customers,
        quotes_by_status,
        orders_by_status,
        revenue,
        open_chats,
        recent_orders,
    }))
}
