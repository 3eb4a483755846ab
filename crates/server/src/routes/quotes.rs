//! Customer and guest quote routes: submit, view, accept.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

use spareline_core::ProductId;

use crate::db::UserRepository;
use crate::error::AppError;
use crate::middleware::OptionalAuth;
use crate::models::order::{Order, PaymentMethod};
use crate::models::quote::{NewQuoteItem, QuoteDetail, SubmittedQuote};
use crate::models::user::Address;
use crate::services::orders::{Checkout, OrderService};
use crate::services::quotes::{QuoteRequest, QuoteService, QuoteViewer};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QuoteItemRequest {
    pub product_id: ProductId,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct SubmitQuoteRequest {
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub vehicle_info: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub items: Vec<QuoteItemRequest>,
}

impl From<SubmitQuoteRequest> for QuoteRequest {
    fn from(req: SubmitQuoteRequest) -> Self {
        Self {
            contact_name: req.contact_name,
            contact_email: req.contact_email,
            contact_phone: req.contact_phone,
            vehicle_info: req.vehicle_info,
            notes: req.notes,
            items: req
                .items
                .into_iter()
                .map(|i| NewQuoteItem {
                    product_id: i.product_id,
                    quantity: i.quantity,
                })
                .collect(),
        }
    }
}

/// `?token=` on guest links.
#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    pub token: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct AcceptQuoteRequest {
    pub shipping_address: Address,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub notes: Option<String>,
}

/// POST /api/quotes
pub async fn submit(
    State(state): State<AppState>,
    OptionalAuth(current): OptionalAuth,
    Json(req): Json<SubmitQuoteRequest>,
) -> Result<(StatusCode, Json<SubmittedQuote>), AppError> {
    let user = match &current {
        Some(current) => UserRepository::new(state.pool()).get_by_id(current.id).await?,
        None => None,
    };
    let submitted = QuoteService::new(state.pool(), state.mail(), &state.config().quotes)
        .submit(req.into(), user.as_ref())
        .await?;
    Ok((StatusCode::CREATED, Json(submitted)))
}

/// GET /api/quotes/{reference}
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(current): OptionalAuth,
    Path(reference): Path<String>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<QuoteDetail>, AppError> {
    let viewer = QuoteViewer {
        user: current.as_ref(),
        token: query.token,
    };
    let detail = QuoteService::new(state.pool(), state.mail(), &state.config().quotes)
        .get_for_viewer(&reference, viewer)
        .await?;
    Ok(Json(detail))
}

/// POST /api/quotes/{reference}/accept
pub async fn accept(
    State(state): State<AppState>,
    OptionalAuth(current): OptionalAuth,
    Path(reference): Path<String>,
    Query(query): Query<TokenQuery>,
    Json(req): Json<AcceptQuoteRequest>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let viewer = QuoteViewer {
        user: current.as_ref(),
        token: query.token,
    };
    let order = OrderService::new(state.pool(), state.mail())
        .accept(
            &reference,
            viewer,
            Checkout {
                shipping_address: req.shipping_address,
                payment_method: req.payment_method,
                notes: req.notes,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}
