//! Quote (RFQ) repository.
//!
//! Reads go through the pool. Writes that must stay consistent with a status
//! check take a `&mut PgConnection` so the quote service can run them inside
//! one transaction after locking the row with [`QuoteRepository::lock`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use spareline_core::{QuoteId, QuoteStatus, UserId};

use super::RepositoryError;
use crate::models::Pagination;
use crate::models::quote::{ItemPrice, NewQuote, Quote, QuoteDetail, QuoteItem};

const QUOTE_COLUMNS: &str = "id, reference, user_id, contact_name, contact_email, contact_phone, \
     vehicle_info, customer_notes, admin_notes, status, discount_percent, total_amount, \
     access_token, valid_until, created_at, updated_at";

const ITEM_SELECT: &str = r"
    SELECT qi.id, qi.quote_id, qi.product_id, p.name AS product_name, p.slug AS product_slug,
           p.part_number, qi.quantity, qi.unit_price
    FROM shop.quote_items qi
    JOIN shop.products p ON p.id = qi.product_id
";

/// Repository for quote database operations.
pub struct QuoteRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> QuoteRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a quote and its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the reference is already used.
    pub async fn create(&self, new: &NewQuote) -> Result<QuoteDetail, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let quote = sqlx::query_as::<_, Quote>(&format!(
            r"
            INSERT INTO shop.quotes
                (reference, user_id, contact_name, contact_email, contact_phone,
                 vehicle_info, customer_notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {QUOTE_COLUMNS}
            "
        ))
        .bind(&new.reference)
        .bind(new.user_id)
        .bind(&new.contact_name)
        .bind(&new.contact_email)
        .bind(&new.contact_phone)
        .bind(&new.vehicle_info)
        .bind(&new.customer_notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "quote reference already exists"))?;

        let mut insert = QueryBuilder::<Postgres>::new(
            "INSERT INTO shop.quote_items (quote_id, product_id, quantity) ",
        );
        insert.push_values(&new.items, |mut row, item| {
            row.push_bind(quote.id)
                .push_bind(item.product_id)
                .push_bind(item.quantity);
        });
        insert.build().execute(&mut *tx).await?;

        let items = Self::items(&mut tx, quote.id).await?;
        tx.commit().await?;

        Ok(QuoteDetail { quote, items })
    }

    /// Quote with items by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: QuoteId) -> Result<Option<QuoteDetail>, RepositoryError> {
        let quote = sqlx::query_as::<_, Quote>(&format!(
            "SELECT {QUOTE_COLUMNS} FROM shop.quotes WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        self.with_items(quote).await
    }

    /// Quote with items by its public reference.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_reference(&self, reference: &str) -> Result<Option<QuoteDetail>, RepositoryError> {
        let quote = sqlx::query_as::<_, Quote>(&format!(
            "SELECT {QUOTE_COLUMNS} FROM shop.quotes WHERE reference = $1"
        ))
        .bind(reference)
        .fetch_optional(self.pool)
        .await?;

        self.with_items(quote).await
    }

    async fn with_items(&self, quote: Option<Quote>) -> Result<Option<QuoteDetail>, RepositoryError> {
        let Some(quote) = quote else {
            return Ok(None);
        };
        let mut conn = self.pool.acquire().await?;
        let items = Self::items(&mut conn, quote.id).await?;
        Ok(Some(QuoteDetail { quote, items }))
    }

    /// Staff listing, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        status: Option<QuoteStatus>,
        pagination: Pagination,
    ) -> Result<(Vec<Quote>, i64), RepositoryError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM shop.quotes WHERE ($1::shop.quote_status IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(self.pool)
        .await?;

        let quotes = sqlx::query_as::<_, Quote>(&format!(
            r"
            SELECT {QUOTE_COLUMNS} FROM shop.quotes
            WHERE ($1::shop.quote_status IS NULL OR status = $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(status)
        .bind(pagination.per_page())
        .bind(pagination.offset())
        .fetch_all(self.pool)
        .await?;

        Ok((quotes, total))
    }

    /// A customer's own quotes, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Quote>, RepositoryError> {
        let quotes = sqlx::query_as::<_, Quote>(&format!(
            "SELECT {QUOTE_COLUMNS} FROM shop.quotes WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(quotes)
    }

    /// Move a quote to `target` if its current status allows it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown id and
    /// `RepositoryError::Conflict` when the status changed underneath us or
    /// does not allow the move.
    pub async fn transition(&self, id: QuoteId, target: QuoteStatus) -> Result<Quote, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        Self::transition_in(&mut conn, id, target).await
    }

    /// Same as [`Self::transition`] on an existing connection or transaction.
    ///
    /// # Errors
    ///
    /// See [`Self::transition`].
    pub async fn transition_in(
        conn: &mut PgConnection,
        id: QuoteId,
        target: QuoteStatus,
    ) -> Result<Quote, RepositoryError> {
        let sources: Vec<String> = QuoteStatus::sources_of(target)
            .into_iter()
            .map(|s| s.as_str().to_owned())
            .collect();

        let updated = sqlx::query_as::<_, Quote>(&format!(
            r"
            UPDATE shop.quotes SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status::text = ANY($3)
            RETURNING {QUOTE_COLUMNS}
            "
        ))
        .bind(id)
        .bind(target)
        .bind(&sources)
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(quote) = updated {
            return Ok(quote);
        }

        let current: Option<QuoteStatus> =
            sqlx::query_scalar("SELECT status FROM shop.quotes WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;
        match current {
            Some(current) => Err(RepositoryError::Conflict(format!(
                "quote is {current} and cannot move to {target}"
            ))),
            None => Err(RepositoryError::NotFound),
        }
    }

    /// Lock a quote row for the rest of the transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lock(conn: &mut PgConnection, id: QuoteId) -> Result<Option<Quote>, RepositoryError> {
        let quote = sqlx::query_as::<_, Quote>(&format!(
            "SELECT {QUOTE_COLUMNS} FROM shop.quotes WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?;
        Ok(quote)
    }

    /// Items of a quote in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(conn: &mut PgConnection, quote_id: QuoteId) -> Result<Vec<QuoteItem>, RepositoryError> {
        let items = sqlx::query_as::<_, QuoteItem>(&format!(
            "{ITEM_SELECT} WHERE qi.quote_id = $1 ORDER BY qi.id"
        ))
        .bind(quote_id)
        .fetch_all(conn)
        .await?;
        Ok(items)
    }

    /// Write unit prices, discount, total and validity, and mark the quote
    /// `price_ready`. The caller holds the row lock and has checked the status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the status changed anyway.
    pub async fn write_prices(
        conn: &mut PgConnection,
        id: QuoteId,
        prices: &[ItemPrice],
        pricing: &QuotePricing<'_>,
    ) -> Result<(), RepositoryError> {
        for price in prices {
            sqlx::query("UPDATE shop.quote_items SET unit_price = $3 WHERE id = $1 AND quote_id = $2")
                .bind(price.item_id)
                .bind(id)
                .bind(price.unit_price)
                .execute(&mut *conn)
                .await?;
        }

        let sources: Vec<String> = QuoteStatus::sources_of(QuoteStatus::PriceReady)
            .into_iter()
            .map(|s| s.as_str().to_owned())
            .collect();

        let result = sqlx::query(
            r"
            UPDATE shop.quotes
            SET discount_percent = $2,
                total_amount = $3,
                admin_notes = COALESCE($4, admin_notes),
                valid_until = $5,
                status = 'price_ready',
                updated_at = NOW()
            WHERE id = $1 AND status::text = ANY($6)
            ",
        )
        .bind(id)
        .bind(pricing.discount_percent)
        .bind(pricing.total_amount)
        .bind(pricing.admin_notes)
        .bind(pricing.valid_until)
        .bind(&sources)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict(
                "quote status changed while pricing".to_owned(),
            ));
        }
        Ok(())
    }

    /// Expire `price_ready` quotes whose validity has passed.
    ///
    /// Returns the references of the quotes that were expired.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn expire_stale(&self) -> Result<Vec<String>, RepositoryError> {
        let references = sqlx::query_scalar(
            r"
            UPDATE shop.quotes
            SET status = 'expired', updated_at = NOW()
            WHERE status = 'price_ready' AND valid_until < NOW()
            RETURNING reference
            ",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(references)
    }
}

/// Quote-level values written alongside item prices.
#[derive(Debug, Clone, Copy)]
pub struct QuotePricing<'a> {
    pub discount_percent: Decimal,
    pub total_amount: Decimal,
    pub admin_notes: Option<&'a str>,
    pub valid_until: DateTime<Utc>,
}
