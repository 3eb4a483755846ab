//! Quote desk: list, review, price and expire RFQs.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use rust_decimal::Decimal;
use serde::Deserialize;

use spareline_core::{Permission, QuoteId, QuoteItemId, QuoteStatus};

use crate::error::AppError;
use crate::middleware::StaffUser;
use crate::models::quote::{ItemPrice, Quote, StaffQuoteDetail};
use crate::models::{Page, Pagination};
use crate::services::quotes::{PriceRequest, QuoteService};
use crate::state::AppState;

/// Build the quote desk router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/quotes", get(list))
        .route("/quotes/{id}", get(show))
        .route("/quotes/{id}/review", post(start_review))
        .route("/quotes/{id}/prices", post(set_prices))
        .route("/quotes/{id}/expire", post(expire))
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub status: Option<QuoteStatus>,
}

#[derive(Debug, Deserialize)]
pub struct ItemPriceRequest {
    pub item_id: QuoteItemId,
    pub unit_price: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct SetPricesRequest {
    pub items: Vec<ItemPriceRequest>,
    #[serde(default)]
    pub discount_percent: Decimal,
    #[serde(default)]
    pub admin_notes: Option<String>,
    #[serde(default)]
    pub valid_days: Option<i64>,
}

impl From<SetPricesRequest> for PriceRequest {
    fn from(req: SetPricesRequest) -> Self {
        Self {
            prices: req
                .items
                .into_iter()
                .map(|i| ItemPrice {
                    item_id: i.item_id,
                    unit_price: i.unit_price,
                })
                .collect(),
            discount_percent: req.discount_percent,
            admin_notes: req.admin_notes,
            valid_days: req.valid_days,
        }
    }
}

fn service(state: &AppState) -> QuoteService<'_> {
    QuoteService::new(state.pool(), state.mail(), &state.config().quotes)
}

async fn list(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Page<Quote>>, AppError> {
    user.require(Permission::ManageQuotes)?;
    Ok(Json(service(&state).list(query.status, pagination).await?))
}

async fn show(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    Path(id): Path<QuoteId>,
) -> Result<Json<StaffQuoteDetail>, AppError> {
    user.require(Permission::ManageQuotes)?;
    Ok(Json(service(&state).get_for_staff(id).await?))
}

async fn start_review(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    Path(id): Path<QuoteId>,
) -> Result<Json<StaffQuoteDetail>, AppError> {
    user.require(Permission::ManageQuotes)?;
    Ok(Json(service(&state).start_review(id).await?))
}

async fn set_prices(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    Path(id): Path<QuoteId>,
    Json(req): Json<SetPricesRequest>,
) -> Result<Json<StaffQuoteDetail>, AppError> {
    user.require(Permission::ManageQuotes)?;
    Ok(Json(service(&state).set_prices(id, req.into()).await?))
}

async fn expire(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    Path(id): Path<QuoteId>,
) -> Result<Json<StaffQuoteDetail>, AppError> {
    user.require(Permission::ManageQuotes)?;
    Ok(Json(service(&state).expire(id).await?))
}
