//! Order models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use spareline_core::{OrderId, OrderStatus, QuoteId, UserId};

use super::user::Address;

/// How the customer intends to pay. Payment is recorded by staff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "shop.payment_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    BankTransfer,
    CashOnDelivery,
    CardOnDelivery,
}

impl PaymentMethod {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::BankTransfer => "Bank transfer",
            Self::CashOnDelivery => "Cash on delivery",
            Self::CardOnDelivery => "Card on delivery",
        }
    }
}

/// An order created from an accepted quote.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub quote_id: QuoteId,
    pub quote_reference: String,
    pub user_id: Option<UserId>,
    pub contact_email: String,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub shipping_address: Address,
    pub payment_method: PaymentMethod,
    pub payment_reference: Option<String>,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Checkout details supplied when accepting a quote.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: String,
    pub shipping_address: Address,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

/// A staff status change with the fields it may carry.
#[derive(Debug, Clone)]
pub struct OrderStatusChange {
    pub status: OrderStatus,
    pub payment_reference: Option<String>,
    pub tracking_number: Option<String>,
}
