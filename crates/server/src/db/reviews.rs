//! Product review repository.

use sqlx::PgPool;

use spareline_core::{ProductId, ReviewId, UserId};

use super::RepositoryError;
use crate::models::catalog::Review;

const REVIEW_SELECT: &str = r"
    SELECT rv.id, rv.product_id, rv.user_id,
           TRIM(u.first_name || ' ' || LEFT(u.last_name, 1)) AS author_name,
           rv.rating, rv.title, rv.comment, rv.is_approved, rv.created_at
    FROM shop.reviews rv
    JOIN shop.users u ON u.id = rv.user_id
";

/// Repository for review database operations.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Approved reviews for a product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_approved(&self, product_id: ProductId) -> Result<Vec<Review>, RepositoryError> {
        let rows = sqlx::query_as::<_, Review>(&format!(
            "{REVIEW_SELECT} WHERE rv.product_id = $1 AND rv.is_approved ORDER BY rv.created_at DESC"
        ))
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Moderation queue. `approved = None` lists everything.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_moderation(&self, approved: Option<bool>) -> Result<Vec<Review>, RepositoryError> {
        let rows = sqlx::query_as::<_, Review>(&format!(
            "{REVIEW_SELECT} WHERE ($1::bool IS NULL OR rv.is_approved = $1) ORDER BY rv.created_at DESC"
        ))
        .bind(approved)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Insert an unapproved review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already reviewed the product.
    pub async fn create(
        &self,
        product_id: ProductId,
        user_id: UserId,
        rating: i16,
        title: Option<&str>,
        comment: &str,
    ) -> Result<Review, RepositoryError> {
        let id: ReviewId = sqlx::query_scalar(
            r"
            INSERT INTO shop.reviews (product_id, user_id, rating, title, comment)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            ",
        )
        .bind(product_id)
        .bind(user_id)
        .bind(rating)
        .bind(title)
        .bind(comment)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "you have already reviewed this product"))?;

        self.get(id).await
    }

    async fn get(&self, id: ReviewId) -> Result<Review, RepositoryError> {
        sqlx::query_as::<_, Review>(&format!("{REVIEW_SELECT} WHERE rv.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Publish a review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown id.
    pub async fn approve(&self, id: ReviewId) -> Result<Review, RepositoryError> {
        let result = sqlx::query("UPDATE shop.reviews SET is_approved = TRUE WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get(id).await
    }

    /// Remove a review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown id.
    pub async fn delete(&self, id: ReviewId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.reviews WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
