//! Orders: accepting a priced quote and moving the order forward.

use axum::http::StatusCode;
use chrono::Utc;
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use spareline_core::{OrderId, OrderStatus, Permission, QuoteStatus, TransitionError, UserId};

use super::generate_reference;
use super::mail::MailService;
use super::quotes::QuoteViewer;
use crate::db::{OrderRepository, QuoteRepository, RepositoryError};
use crate::error::add_breadcrumb;
use crate::models::order::{NewOrder, Order, OrderStatusChange, PaymentMethod};
use crate::models::user::Address;
use crate::models::{CurrentUser, Page, Pagination};

const MAX_NOTES_LENGTH: usize = 2000;
const MAX_REFERENCE_LENGTH: usize = 100;

/// Errors raised while creating or updating orders.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("{0}")]
    Validation(String),

    #[error("not found")]
    NotFound,

    #[error("you do not have access to this order")]
    Forbidden,

    #[error("quote is {0} and cannot be accepted")]
    QuoteNotReady(QuoteStatus),

    #[error("quote {0} is no longer valid")]
    QuoteExpired(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl OrderError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound | Self::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::QuoteNotReady(_)
            | Self::QuoteExpired(_)
            | Self::Transition(_)
            | Self::Repository(RepositoryError::Conflict(_)) => StatusCode::CONFLICT,
            Self::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Checkout details sent with an accept request.
#[derive(Debug, Clone)]
pub struct Checkout {
    pub shipping_address: Address,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

/// Order service.
pub struct OrderService<'a> {
    pool: &'a PgPool,
    mail: &'a MailService,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, mail: &'a MailService) -> Self {
        Self { pool, mail }
    }

    fn orders(&self) -> OrderRepository<'a> {
        OrderRepository::new(self.pool)
    }

    /// Turn a priced quote into an order.
    ///
    /// The quote row is locked for the whole transaction; the order insert
    /// and the `price_ready → converted` move commit together. A quote whose
    /// validity has passed is marked expired and the request fails.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::QuoteNotReady` or `OrderError::QuoteExpired`
    /// (409) when the quote cannot be accepted, and `OrderError::Validation`
    /// for an incomplete address.
    #[instrument(skip(self, viewer, checkout))]
    pub async fn accept(
        &self,
        reference: &str,
        viewer: QuoteViewer<'_>,
        checkout: Checkout,
    ) -> Result<Order, OrderError> {
        checkout
            .shipping_address
            .validate()
            .map_err(OrderError::Validation)?;
        let notes = checkout.notes.as_deref().map(str::trim).filter(|n| !n.is_empty());
        if notes.is_some_and(|n| n.chars().count() > MAX_NOTES_LENGTH) {
            return Err(OrderError::Validation(format!(
                "notes must be at most {MAX_NOTES_LENGTH} characters"
            )));
        }

        let quote_id = QuoteRepository::new(self.pool)
            .get_by_reference(reference)
            .await?
            .map(|detail| detail.quote.id)
            .ok_or(OrderError::NotFound)?;

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        let quote = QuoteRepository::lock(&mut *tx, quote_id)
            .await?
            .ok_or(OrderError::NotFound)?;
        if !viewer.can_view(&quote) {
            return Err(OrderError::Forbidden);
        }
        if !quote.is_acceptable(Utc::now()) {
            if quote.status != QuoteStatus::PriceReady {
                return Err(OrderError::QuoteNotReady(quote.status));
            }
            QuoteRepository::transition_in(&mut *tx, quote.id, QuoteStatus::Expired).await?;
            tx.commit().await.map_err(RepositoryError::from)?;
            tracing::info!(reference = %quote.reference, "Quote expired on acceptance");
            return Err(OrderError::QuoteExpired(quote.reference));
        }
        let total_amount = quote.total_amount.ok_or_else(|| {
            OrderError::Repository(RepositoryError::DataCorruption(format!(
                "priced quote {} has no total",
                quote.reference
            )))
        })?;

        let new = NewOrder {
            order_number: generate_reference("ORD", Utc::now()),
            shipping_address: checkout.shipping_address,
            payment_method: checkout.payment_method,
            notes: notes.map(str::to_owned),
        };
        let order_id = OrderRepository::insert(&mut *tx, &quote, total_amount, &new).await?;
        QuoteRepository::transition_in(&mut *tx, quote.id, QuoteStatus::Converted).await?;
        let order = OrderRepository::get_in(&mut *tx, order_id)
            .await?
            .ok_or(OrderError::NotFound)?;
        tx.commit().await.map_err(RepositoryError::from)?;

        tracing::info!(
            order_number = %order.order_number,
            reference = %quote.reference,
            total = %order.total_amount,
            "Quote converted to order"
        );
        add_breadcrumb("orders", "Order created", Some(&[("order_number", &order.order_number)]));
        self.mail.send_order_confirmation(&order);
        Ok(order)
    }

    /// Order by number for its owner or staff allowed to manage orders.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` or `OrderError::Forbidden`.
    pub async fn get_for_viewer(&self, order_number: &str, user: &CurrentUser) -> Result<Order, OrderError> {
        let order = self
            .orders()
            .get_by_number(order_number)
            .await?
            .ok_or(OrderError::NotFound)?;
        if order.user_id == Some(user.id) || user.role.has(Permission::ManageOrders) {
            Ok(order)
        } else {
            Err(OrderError::Forbidden)
        }
    }

    /// Staff view by id.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` for an unknown id.
    pub async fn get(&self, id: OrderId) -> Result<Order, OrderError> {
        self.orders().get_by_id(id).await?.ok_or(OrderError::NotFound)
    }

    /// Staff listing.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the query fails.
    pub async fn list(&self, status: Option<OrderStatus>, pagination: Pagination) -> Result<Page<Order>, OrderError> {
        let (orders, total) = self.orders().list(status, pagination).await?;
        Ok(Page::new(orders, total, pagination))
    }

    /// A customer's orders.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, OrderError> {
        Ok(self.orders().list_for_user(user_id).await?)
    }

    /// Move an order forward and email the customer.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Transition` for backward moves and
    /// `OrderError::Validation` when shipping without a tracking number.
    #[instrument(skip(self, change), fields(status = %change.status))]
    pub async fn update_status(&self, id: OrderId, change: OrderStatusChange) -> Result<Order, OrderError> {
        let change = OrderStatusChange {
            status: change.status,
            payment_reference: clean_reference("payment_reference", change.payment_reference)?,
            tracking_number: clean_reference("tracking_number", change.tracking_number)?,
        };

        let current = self.get(id).await?;
        current.status.transition(change.status)?;
        require_tracking(&current, &change)?;

        let order = self.orders().update_status(id, &change).await?;
        tracing::info!(
            order_number = %order.order_number,
            from = %current.status,
            to = %order.status,
            "Order status updated"
        );
        self.mail.send_order_status(&order);
        Ok(order)
    }
}

/// Shipping needs a tracking number, given now or stored earlier.
fn require_tracking(current: &Order, change: &OrderStatusChange) -> Result<(), OrderError> {
    if change.status >= OrderStatus::Shipped
        && change.tracking_number.is_none()
        && current.tracking_number.is_none()
    {
        return Err(OrderError::Validation(
            "a tracking number is required to ship an order".to_owned(),
        ));
    }
    Ok(())
}

fn clean_reference(field: &str, value: Option<String>) -> Result<Option<String>, OrderError> {
    let Some(value) = value.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if value.chars().count() > MAX_REFERENCE_LENGTH {
        return Err(OrderError::Validation(format!(
            "{field} must be at most {MAX_REFERENCE_LENGTH} characters"
        )));
    }
    Ok(Some(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use spareline_core::QuoteId;

    use super::*;

    fn order(status: OrderStatus, tracking: Option<&str>) -> Order {
        let now = Utc::now();
        Order {
            id: OrderId::new(1),
            order_number: "ORD-20261019-4M8XQ2".to_owned(),
            quote_id: QuoteId::new(1),
            quote_reference: "RFQ-20261018-ABCD23".to_owned(),
            user_id: None,
            contact_email: "ana@example.com".to_owned(),
            total_amount: Decimal::new(12_000, 2),
            status,
            shipping_address: Address {
                label: None,
                recipient: "Ana".to_owned(),
                line1: "1 Main St".to_owned(),
                line2: None,
                city: "Porto".to_owned(),
                region: None,
                postal_code: None,
                country: "PT".to_owned(),
                phone: None,
                is_default: false,
            },
            payment_method: PaymentMethod::BankTransfer,
            payment_reference: None,
            tracking_number: tracking.map(str::to_owned),
            notes: None,
            paid_at: None,
            shipped_at: None,
            delivered_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn change(status: OrderStatus, tracking: Option<&str>) -> OrderStatusChange {
        OrderStatusChange {
            status,
            payment_reference: None,
            tracking_number: tracking.map(str::to_owned),
        }
    }

    #[test]
    fn test_shipping_requires_tracking() {
        let paid = order(OrderStatus::Paid, None);
        assert!(require_tracking(&paid, &change(OrderStatus::Shipped, None)).is_err());
        assert!(require_tracking(&paid, &change(OrderStatus::Delivered, None)).is_err());
        assert!(require_tracking(&paid, &change(OrderStatus::Shipped, Some("1Z999"))).is_ok());
        assert!(require_tracking(&paid, &change(OrderStatus::Processing, None)).is_ok());

        let shipped = order(OrderStatus::Shipped, Some("1Z999"));
        assert!(require_tracking(&shipped, &change(OrderStatus::Delivered, None)).is_ok());
    }

    #[test]
    fn test_clean_reference() {
        assert_eq!(clean_reference("f", Some("  ".to_owned())).unwrap(), None);
        assert_eq!(
            clean_reference("f", Some(" TX-1 ".to_owned())).unwrap().as_deref(),
            Some("TX-1")
        );
        assert!(clean_reference("f", Some("x".repeat(MAX_REFERENCE_LENGTH + 1))).is_err());
    }

    #[test]
    fn test_error_statuses() {
        assert_eq!(OrderError::QuoteNotReady(QuoteStatus::Pending).status(), StatusCode::CONFLICT);
        assert_eq!(OrderError::QuoteExpired("RFQ-1".to_owned()).status(), StatusCode::CONFLICT);
        assert_eq!(OrderError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            OrderError::Repository(RepositoryError::NotFound).status(),
            StatusCode::NOT_FOUND
        );
    }
}
