//! Order repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use spareline_core::{OrderId, OrderStatus, QuoteId, UserId};

use super::RepositoryError;
use crate::models::Pagination;
use crate::models::order::{NewOrder, Order, OrderStatusChange, PaymentMethod};
use crate::models::quote::Quote;
use crate::models::user::Address;

const ORDER_SELECT: &str = r"
    SELECT o.id, o.order_number, o.quote_id, q.reference AS quote_reference, o.user_id,
           o.contact_email, o.total_amount, o.status, o.shipping_address, o.payment_method,
           o.payment_reference, o.tracking_number, o.notes, o.paid_at, o.shipped_at,
           o.delivered_at, o.created_at, o.updated_at
    FROM shop.orders o
    JOIN shop.quotes q ON q.id = o.quote_id
";

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    order_number: String,
    quote_id: QuoteId,
    quote_reference: String,
    user_id: Option<UserId>,
    contact_email: String,
    total_amount: Decimal,
    status: OrderStatus,
    shipping_address: Json<Address>,
    payment_method: PaymentMethod,
    payment_reference: Option<String>,
    tracking_number: Option<String>,
    notes: Option<String>,
    paid_at: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.id,
            order_number: row.order_number,
            quote_id: row.quote_id,
            quote_reference: row.quote_reference,
            user_id: row.user_id,
            contact_email: row.contact_email,
            total_amount: row.total_amount,
            status: row.status,
            shipping_address: row.shipping_address.0,
            payment_method: row.payment_method,
            payment_reference: row.payment_reference,
            tracking_number: row.tracking_number,
            notes: row.notes,
            paid_at: row.paid_at,
            shipped_at: row.shipped_at,
            delivered_at: row.delivered_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert the order for a locked, priced quote.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the quote already has an order.
    pub async fn insert(
        conn: &mut PgConnection,
        quote: &Quote,
        total_amount: Decimal,
        new: &NewOrder,
    ) -> Result<OrderId, RepositoryError> {
        let id = sqlx::query_scalar(
            r"
            INSERT INTO shop.orders
                (order_number, quote_id, user_id, contact_email, total_amount,
                 shipping_address, payment_method, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            ",
        )
        .bind(&new.order_number)
        .bind(quote.id)
        .bind(quote.user_id)
        .bind(&quote.contact_email)
        .bind(total_amount)
        .bind(Json(&new.shipping_address))
        .bind(new.payment_method)
        .bind(&new.notes)
        .fetch_one(conn)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "this quote has already been ordered"))?;

        Ok(id)
    }

    /// Order by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        Self::get_in(&mut conn, id).await
    }

    /// Order by id on an existing connection or transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_in(conn: &mut PgConnection, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("{ORDER_SELECT} WHERE o.id = $1"))
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(row.map(Order::from))
    }

    /// Order by its public number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_number(&self, order_number: &str) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("{ORDER_SELECT} WHERE o.order_number = $1"))
            .bind(order_number)
            .fetch_optional(self.pool)
            .await?;
        Ok(row.map(Order::from))
    }

    /// Staff listing, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        status: Option<OrderStatus>,
        pagination: Pagination,
    ) -> Result<(Vec<Order>, i64), RepositoryError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM shop.orders WHERE ($1::shop.order_status IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(self.pool)
        .await?;

        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r"{ORDER_SELECT}
              WHERE ($1::shop.order_status IS NULL OR o.status = $1)
              ORDER BY o.created_at DESC, o.id DESC
              LIMIT $2 OFFSET $3"
        ))
        .bind(status)
        .bind(pagination.per_page())
        .bind(pagination.offset())
        .fetch_all(self.pool)
        .await?;

        Ok((rows.into_iter().map(Order::from).collect(), total))
    }

    /// A customer's own orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "{ORDER_SELECT} WHERE o.user_id = $1 ORDER BY o.created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Order::from).collect())
    }

    /// Most recent orders, for the dashboard.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn recent(&self, limit: i64) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "{ORDER_SELECT} ORDER BY o.created_at DESC, o.id DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Order::from).collect())
    }

    /// Move an order forward, stamping `paid_at`, `shipped_at` and
    /// `delivered_at` the first time each stage is reached or passed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown id and
    /// `RepositoryError::Conflict` when the current status does not allow
    /// the move.
    pub async fn update_status(&self, id: OrderId, change: &OrderStatusChange) -> Result<Order, RepositoryError> {
        let sources: Vec<String> = OrderStatus::sources_of(change.status)
            .into_iter()
            .map(|s| s.as_str().to_owned())
            .collect();

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r"
            UPDATE shop.orders
            SET status = $2,
                payment_reference = COALESCE($3, payment_reference),
                tracking_number = COALESCE($4, tracking_number),
                paid_at = CASE WHEN $2 >= 'paid'::shop.order_status
                               THEN COALESCE(paid_at, NOW()) ELSE paid_at END,
                shipped_at = CASE WHEN $2 >= 'shipped'::shop.order_status
                                  THEN COALESCE(shipped_at, NOW()) ELSE shipped_at END,
                delivered_at = CASE WHEN $2 = 'delivered'::shop.order_status
                                    THEN COALESCE(delivered_at, NOW()) ELSE delivered_at END,
                updated_at = NOW()
            WHERE id = $1 AND status::text = ANY($5)
            ",
        )
        .bind(id)
        .bind(change.status)
        .bind(&change.payment_reference)
        .bind(&change.tracking_number)
        .bind(&sources)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let current: Option<OrderStatus> =
                sqlx::query_scalar("SELECT status FROM shop.orders WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?;
            return match current {
                Some(current) => Err(RepositoryError::Conflict(format!(
                    "order is {current} and cannot move to {}",
                    change.status
                ))),
                None => Err(RepositoryError::NotFound),
            };
        }

        let order = Self::get_in(&mut tx, id).await?.ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;
        Ok(order)
    }
}
