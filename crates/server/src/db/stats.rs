//! Back-office dashboard aggregates.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use spareline_core::{OrderStatus, QuoteStatus};

use super::RepositoryError;

/// Stock at or below this counts as low.
pub const LOW_STOCK_THRESHOLD: i32 = 5;

/// Catalog counters.
#[derive(Debug, Clone, Copy, Default, Serialize, sqlx::FromRow)]
pub struct ProductCounts {
    pub total: i64,
    pub active: i64,
    pub low_stock: i64,
}

/// Revenue over orders that moved past `pending`.
#[derive(Debug, Clone, Copy, Default, Serialize, sqlx::FromRow)]
pub struct Revenue {
    pub total: Decimal,
    pub last_30_days: Decimal,
}

/// Repository for dashboard statistics.
pub struct StatsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StatsRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn product_counts(&self) -> Result<ProductCounts, RepositoryError> {
        let counts = sqlx::query_as::<_, ProductCounts>(
            r"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE is_active) AS active,
                   COUNT(*) FILTER (WHERE is_active AND stock_quantity <= $1) AS low_stock
            FROM shop.products
            ",
        )
        .bind(LOW_STOCK_THRESHOLD)
        .fetch_one(self.pool)
        .await?;
        Ok(counts)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn customer_count(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM shop.users WHERE role = 'customer'")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Quote count per status. Every status is present, zero if unused.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn quotes_by_status(&self) -> Result<BTreeMap<&'static str, i64>, RepositoryError> {
        let rows: Vec<(QuoteStatus, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM shop.quotes GROUP BY status")
                .fetch_all(self.pool)
                .await?;

        let mut counts: BTreeMap<&'static str, i64> =
            QuoteStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();
        for (status, count) in rows {
            counts.insert(status.as_str(), count);
        }
        Ok(counts)
    }

    /// Order count per status. Every status is present, zero if unused.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn orders_by_status(&self) -> Result<BTreeMap<&'static str, i64>, RepositoryError> {
        let rows: Vec<(OrderStatus, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM shop.orders GROUP BY status")
                .fetch_all(self.pool)
                .await?;

        let mut counts: BTreeMap<&'static str, i64> =
            OrderStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();
        for (status, count) in rows {
            counts.insert(status.as_str(), count);
        }
        Ok(counts)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn revenue(&self) -> Result<Revenue, RepositoryError> {
        let revenue = sqlx::query_as::<_, Revenue>(
            r"
            SELECT COALESCE(SUM(total_amount), 0) AS total,
                   COALESCE(SUM(total_amount) FILTER (WHERE created_at >= NOW() - INTERVAL '30 days'), 0)
                       AS last_30_days
            FROM shop.orders
            WHERE status::text = ANY($1)
            ",
        )
        .bind(revenue_statuses())
        .fetch_one(self.pool)
        .await?;
        Ok(revenue)
    }

    /// Conversations still waiting on an agent or visitor.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn open_chats(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM shop.chat_conversations WHERE status = 'active'",
        )
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }
}

/// Order statuses whose totals are summed as revenue.
fn revenue_statuses() -> Vec<&'static str> {
    OrderStatus::ALL
        .into_iter()
        .filter(|status| status.counts_as_revenue())
        .map(OrderStatus::as_str)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_orders_are_not_revenue() {
        let statuses = revenue_statuses();
        assert!(!statuses.contains(&"pending"));
        assert!(statuses.contains(&"paid"));
        assert!(statuses.contains(&"delivered"));
        assert_eq!(statuses.len(), OrderStatus::ALL.len() - 1);
    }
}
