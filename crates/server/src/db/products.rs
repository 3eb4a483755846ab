//! Product repository.
//!
//! Products are always read joined with their brand, category and condition
//! plus a rating summary over approved reviews.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};

use spareline_core::{BrandId, CategoryId, ConditionId, ProductId};

use super::RepositoryError;
use super::users::escape_like;
use crate::models::Pagination;
use crate::models::catalog::{Fitment, Product, ProductFilter, RatingSummary, TaxonRef};

const PRODUCT_SELECT: &str = r"
    SELECT p.id, p.name, p.slug, p.part_number, p.description, p.price, p.stock_quantity,
           p.images, p.compatibility, p.is_active, p.is_featured, p.created_at, p.updated_at,
           b.id AS brand_id, b.name AS brand_name, b.slug AS brand_slug,
           c.id AS category_id, c.name AS category_name, c.slug AS category_slug,
           cd.id AS condition_id, cd.name AS condition_name, cd.slug AS condition_slug,
           r.rating_average, r.rating_count
";

const PRODUCT_FROM: &str = r"
    FROM shop.products p
    JOIN shop.brands b ON b.id = p.brand_id
    JOIN shop.categories c ON c.id = p.category_id
    JOIN shop.conditions cd ON cd.id = p.condition_id
";

const RATING_JOIN: &str = r"
    LEFT JOIN LATERAL (
        SELECT ROUND(AVG(rv.rating), 2) AS rating_average, COUNT(*) AS rating_count
        FROM shop.reviews rv
        WHERE rv.product_id = p.id AND rv.is_approved
    ) r ON TRUE
";

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    slug: String,
    part_number: Option<String>,
    description: Option<String>,
    price: Decimal,
    stock_quantity: i32,
    images: Json<Vec<String>>,
    compatibility: Json<Vec<Fitment>>,
    is_active: bool,
    is_featured: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    brand_id: BrandId,
    brand_name: String,
    brand_slug: String,
    category_id: CategoryId,
    category_name: String,
    category_slug: String,
    condition_id: ConditionId,
    condition_name: String,
    condition_slug: String,
    rating_average: Option<Decimal>,
    rating_count: i64,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            part_number: row.part_number,
            description: row.description,
            price: row.price,
            stock_quantity: row.stock_quantity,
            images: row.images.0,
            compatibility: row.compatibility.0,
            brand: TaxonRef {
                id: row.brand_id,
                name: row.brand_name,
                slug: row.brand_slug,
            },
            category: TaxonRef {
                id: row.category_id,
                name: row.category_name,
                slug: row.category_slug,
            },
            condition: TaxonRef {
                id: row.condition_id,
                name: row.condition_name,
                slug: row.condition_slug,
            },
            is_active: row.is_active,
            is_featured: row.is_featured,
            rating: RatingSummary {
                average: row.rating_average,
                count: row.rating_count,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Fields for a new product. The slug is already derived and validated.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub slug: String,
    pub part_number: Option<String>,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock_quantity: i32,
    pub images: Vec<String>,
    pub compatibility: Vec<Fitment>,
    pub brand_id: BrandId,
    pub category_id: CategoryId,
    pub condition_id: ConditionId,
    pub is_active: bool,
    pub is_featured: bool,
}

/// Partial product update. `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub part_number: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub images: Option<Vec<String>>,
    pub compatibility: Option<Vec<Fitment>>,
    pub brand_id: Option<BrandId>,
    pub category_id: Option<CategoryId>,
    pub condition_id: Option<ConditionId>,
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Filtered, sorted and paginated listing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &ProductFilter,
        pagination: Pagination,
    ) -> Result<(Vec<Product>, i64), RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
        count.push(PRODUCT_FROM).push(" WHERE TRUE");
        push_product_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(self.pool).await?;

        let mut query = QueryBuilder::<Postgres>::new(PRODUCT_SELECT);
        query.push(PRODUCT_FROM).push(RATING_JOIN).push(" WHERE TRUE");
        push_product_filter(&mut query, filter);
        query
            .push(" ORDER BY ")
            .push(filter.sort.order_by())
            .push(" LIMIT ")
            .push_bind(pagination.per_page())
            .push(" OFFSET ")
            .push_bind(pagination.offset());

        let rows: Vec<ProductRow> = query.build_query_as().fetch_all(self.pool).await?;
        Ok((rows.into_iter().map(Product::from).collect(), total))
    }

    /// Product by slug. Inactive products are only returned when asked for.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(
        &self,
        slug: &str,
        include_inactive: bool,
    ) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "{PRODUCT_SELECT} {PRODUCT_FROM} {RATING_JOIN} WHERE p.slug = $1 AND (p.is_active OR $2)"
        ))
        .bind(slug)
        .bind(include_inactive)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    /// Product by id, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "{PRODUCT_SELECT} {PRODUCT_FROM} {RATING_JOIN} WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    /// Which of `ids` exist and are active.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn active_ids(&self, ids: &[ProductId]) -> Result<Vec<ProductId>, RepositoryError> {
        let raw: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let found = sqlx::query_scalar::<_, ProductId>(
            "SELECT id FROM shop.products WHERE id = ANY($1) AND is_active",
        )
        .bind(raw)
        .fetch_all(self.pool)
        .await?;
        Ok(found)
    }

    /// Active products among `ids`, in the order given.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active_by_ids(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let raw: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r"{PRODUCT_SELECT} {PRODUCT_FROM} {RATING_JOIN}
            JOIN UNNEST($1::int4[]) WITH ORDINALITY AS wanted(id, position) ON wanted.id = p.id
            WHERE p.is_active
            ORDER BY wanted.position"
        ))
        .bind(raw)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Whether a product with this id exists and is active.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn is_active(&self, id: ProductId) -> Result<bool, RepositoryError> {
        Ok(!self.active_ids(&[id]).await?.is_empty())
    }

    /// Insert a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` for a taken slug or an unknown
    /// brand, category or condition.
    pub async fn create(&self, new: &NewProduct) -> Result<Product, RepositoryError> {
        let id: ProductId = sqlx::query_scalar(
            r"
            INSERT INTO shop.products
                (name, slug, part_number, description, price, stock_quantity, images,
                 compatibility, brand_id, category_id, condition_id, is_active, is_featured)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING id
            ",
        )
        .bind(&new.name)
        .bind(&new.slug)
        .bind(&new.part_number)
        .bind(&new.description)
        .bind(new.price)
        .bind(new.stock_quantity)
        .bind(Json(&new.images))
        .bind(Json(&new.compatibility))
        .bind(new.brand_id)
        .bind(new.category_id)
        .bind(new.condition_id)
        .bind(new.is_active)
        .bind(new.is_featured)
        .fetch_one(self.pool)
        .await
        .map_err(map_write_error)?;

        self.get_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown id.
    pub async fn update(&self, id: ProductId, patch: &ProductPatch) -> Result<Product, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.products
            SET name = COALESCE($2, name),
                slug = COALESCE($3, slug),
                part_number = CASE WHEN $4::text IS NULL THEN part_number ELSE NULLIF($4, '') END,
                description = CASE WHEN $5::text IS NULL THEN description ELSE NULLIF($5, '') END,
                price = COALESCE($6, price),
                images = COALESCE($7, images),
                compatibility = COALESCE($8, compatibility),
                brand_id = COALESCE($9, brand_id),
                category_id = COALESCE($10, category_id),
                condition_id = COALESCE($11, condition_id),
                is_active = COALESCE($12, is_active),
                is_featured = COALESCE($13, is_featured),
                updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(&patch.name)
        .bind(&patch.slug)
        .bind(&patch.part_number)
        .bind(&patch.description)
        .bind(patch.price)
        .bind(patch.images.as_ref().map(Json))
        .bind(patch.compatibility.as_ref().map(Json))
        .bind(patch.brand_id)
        .bind(patch.category_id)
        .bind(patch.condition_id)
        .bind(patch.is_active)
        .bind(patch.is_featured)
        .execute(self.pool)
        .await
        .map_err(map_write_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Delete a product. Products on existing quotes cannot be deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` while quote items reference it.
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.products WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| {
                RepositoryError::from_constraint(
                    e,
                    "product appears on quotes; deactivate it instead",
                )
            })?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Add `delta` (possibly negative) to stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if stock would drop below zero or
    /// past `i32::MAX`.
    pub async fn adjust_stock(&self, id: ProductId, delta: i32) -> Result<Product, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.products
            SET stock_quantity = (stock_quantity::bigint + $2)::integer, updated_at = NOW()
            WHERE id = $1 AND stock_quantity::bigint + $2 BETWEEN 0 AND $3
            ",
        )
        .bind(id)
        .bind(i64::from(delta))
        .bind(i64::from(i32::MAX))
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.get_by_id(id).await? {
                Some(product) => Err(RepositoryError::Conflict(format!(
                    "stock must stay between 0 and {} (current stock {})",
                    i32::MAX,
                    product.stock_quantity
                ))),
                None => Err(RepositoryError::NotFound),
            };
        }
        self.get_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Active products at or below `threshold` units, lowest stock first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn low_stock(&self, threshold: i32) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r"{PRODUCT_SELECT} {PRODUCT_FROM} {RATING_JOIN}
              WHERE p.is_active AND p.stock_quantity <= $1
              ORDER BY p.stock_quantity ASC, p.name ASC"
        ))
        .bind(threshold)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }
}

fn map_write_error(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            return RepositoryError::Conflict("a product with this slug already exists".to_owned());
        }
        if db_err.is_foreign_key_violation() {
            return RepositoryError::Conflict(
                "brand, category or condition does not exist".to_owned(),
            );
        }
    }
    RepositoryError::Database(err)
}

fn push_product_filter(query: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
    if !filter.include_inactive {
        query.push(" AND p.is_active");
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", escape_like(search));
        query
            .push(" AND (p.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.part_number ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(brand) = filter.brand.as_deref() {
        query.push(" AND b.slug = ").push_bind(brand.to_owned());
    }
    if let Some(category) = filter.category.as_deref() {
        query.push(" AND c.slug = ").push_bind(category.to_owned());
    }
    if let Some(condition) = filter.condition.as_deref() {
        query.push(" AND cd.slug = ").push_bind(condition.to_owned());
    }
    if let Some(min) = filter.min_price {
        query.push(" AND p.price >= ").push_bind(min);
    }
    if let Some(max) = filter.max_price {
        query.push(" AND p.price <= ").push_bind(max);
    }
    match filter.in_stock {
        Some(true) => {
            query.push(" AND p.stock_quantity > 0");
        }
        Some(false) => {
            query.push(" AND p.stock_quantity = 0");
        }
        None => {}
    }
    if let Some(featured) = filter.featured {
        query.push(" AND p.is_featured = ").push_bind(featured);
    }
    if let Some(make) = filter.make.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        query
            .push(
                " AND EXISTS (SELECT 1 FROM jsonb_array_elements(p.compatibility) f WHERE f->>'make' ILIKE ",
            )
            .push_bind(escape_like(make))
            .push(")");
    }
}
