//! Public catalog: products, taxonomy and reviews.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

use crate::db::{ProductRepository, ReviewRepository, TaxonomyRepository, taxonomy::Taxon};
use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::catalog::{Brand, Category, Condition, Product, ProductFilter, Review};
use crate::models::{Page, Pagination};
use crate::state::AppState;

const MAX_REVIEW_TITLE_LENGTH: usize = 200;
const MAX_REVIEW_COMMENT_LENGTH: usize = 2000;

/// GET /api/products
pub async fn list_products(
    State(state): State<AppState>,
    Query(mut filter): Query<ProductFilter>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Page<Product>>, AppError> {
    filter.include_inactive = false;
    if let (Some(min), Some(max)) = (filter.min_price, filter.max_price)
        && min > max
    {
        return Err(AppError::BadRequest("min_price must not exceed max_price".to_owned()));
    }
    let (items, total) = ProductRepository::new(state.pool())
        .list(&filter, pagination)
        .await?;
    Ok(Json(Page::new(items, total, pagination)))
}

/// GET /api/products/{slug}
pub async fn show_product(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Product>, AppError> {
    let product = active_product(&state, &slug).await?;
    Ok(Json(product))
}

async fn active_product(state: &AppState, slug: &str) -> Result<Product, AppError> {
    ProductRepository::new(state.pool())
        .get_by_slug(slug, false)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {slug} not found")))
}

async fn list_taxa<T: Taxon>(state: &AppState) -> Result<Json<Vec<T>>, AppError> {
    Ok(Json(TaxonomyRepository::new(state.pool()).list::<T>().await?))
}

/// GET /api/brands
pub async fn brands(State(state): State<AppState>) -> Result<Json<Vec<Brand>>, AppError> {
    list_taxa(&state).await
}

/// GET /api/categories
pub async fn categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>, AppError> {
    list_taxa(&state).await
}

/// GET /api/conditions
pub async fn conditions(State(state): State<AppState>) -> Result<Json<Vec<Condition>>, AppError> {
    list_taxa(&state).await
}

/// GET /api/products/{slug}/reviews
pub async fn list_reviews(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Vec<Review>>, AppError> {
    let product = active_product(&state, &slug).await?;
    let reviews = ReviewRepository::new(state.pool())
        .list_approved(product.id)
        .await?;
    Ok(Json(reviews))
}

#[derive(Debug, Deserialize)]
pub struct NewReviewRequest {
    pub rating: i16,
    #[serde(default)]
    pub title: Option<String>,
    pub comment: String,
}

impl NewReviewRequest {
    fn validate(&self) -> Result<(Option<&str>, &str), AppError> {
        if !(1..=5).contains(&self.rating) {
            return Err(AppError::BadRequest("rating must be between 1 and 5".to_owned()));
        }
        let title = self.title.as_deref().map(str::trim).filter(|t| !t.is_empty());
        if title.is_some_and(|t| t.chars().count() > MAX_REVIEW_TITLE_LENGTH) {
            return Err(AppError::BadRequest(format!(
                "title must be at most {MAX_REVIEW_TITLE_LENGTH} characters"
            )));
        }
        let comment = self.comment.trim();
        if comment.is_empty() {
            return Err(AppError::BadRequest("comment is required".to_owned()));
        }
        if comment.chars().count() > MAX_REVIEW_COMMENT_LENGTH {
            return Err(AppError::BadRequest(format!(
                "comment must be at most {MAX_REVIEW_COMMENT_LENGTH} characters"
            )));
        }
        Ok((title, comment))
    }
}

/// POST /api/products/{slug}/reviews
///
/// Reviews are held for moderation.
pub async fn create_review(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Path(slug): Path<String>,
    Json(req): Json<NewReviewRequest>,
) -> Result<(StatusCode, Json<Review>), AppError> {
    let (title, comment) = req.validate()?;
    let product = active_product(&state, &slug).await?;
    let review = ReviewRepository::new(state.pool())
        .create(product.id, current.id, req.rating, title, comment)
        .await?;
    tracing::info!(review_id = %review.id, product = %product.slug, "Review submitted");
    Ok((StatusCode::CREATED, Json(review)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn review(rating: i16, comment: &str) -> NewReviewRequest {
        NewReviewRequest {
            rating,
            title: Some("  ".to_owned()),
            comment: comment.to_owned(),
        }
    }

    #[test]
    fn test_review_validation() {
        let ok = review(5, " Fits perfectly ");
        let (title, comment) = ok.validate().unwrap();
        assert_eq!(title, None);
        assert_eq!(comment, "Fits perfectly");

        assert!(review(0, "x").validate().is_err());
        assert!(review(6, "x").validate().is_err());
        assert!(review(3, "   ").validate().is_err());
        assert!(
            review(3, &"x".repeat(MAX_REVIEW_COMMENT_LENGTH + 1))
                .validate()
                .is_err()
        );
    }
}
