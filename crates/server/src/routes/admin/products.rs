//! Product management: CRUD, stock adjustments and the low-stock report.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use spareline_core::{BrandId, CategoryId, ConditionId, Permission, ProductId};

use super::{required_name, slug_or_derive};
use crate::db::ProductRepository;
use crate::db::products::{NewProduct, ProductPatch};
use crate::db::stats::LOW_STOCK_THRESHOLD;
use crate::error::AppError;
use crate::middleware::StaffUser;
use crate::models::catalog::{Fitment, Product, ProductFilter};
use crate::models::{Page, Pagination};
use crate::state::AppState;

const MAX_IMAGES: usize = 20;
const MAX_FITMENTS: usize = 100;
/// Largest stock change accepted in one adjustment.
const MAX_STOCK_DELTA: i32 = 1_000_000;

/// Build the product management router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(list).post(create))
        .route("/products/low-stock", get(low_stock))
        .route("/products/{id}", get(show).patch(update).delete(remove))
        .route("/products/{id}/stock", post(adjust_stock))
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub part_number: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub stock_quantity: i32,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub compatibility: Vec<Fitment>,
    pub brand_id: BrandId,
    pub category_id: CategoryId,
    pub condition_id: ConditionId,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_featured: bool,
}

const fn default_true() -> bool {
    true
}

impl CreateProductRequest {
    fn into_new_product(self) -> Result<NewProduct, AppError> {
        let name = required_name(&self.name)?;
        let slug = slug_or_derive(self.slug.as_deref(), &name)?;
        check_price(self.price)?;
        if self.stock_quantity < 0 {
            return Err(AppError::BadRequest("stock_quantity cannot be negative".to_owned()));
        }
        check_media(&self.images, &self.compatibility)?;

        Ok(NewProduct {
            name,
            slug,
            part_number: clean_optional(self.part_number),
            description: clean_optional(self.description),
            price: self.price,
            stock_quantity: self.stock_quantity,
            images: self.images,
            compatibility: self.compatibility,
            brand_id: self.brand_id,
            category_id: self.category_id,
            condition_id: self.condition_id,
            is_active: self.is_active,
            is_featured: self.is_featured,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductRequest {
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

impl UpdateProductRequest {
    fn into_patch(self) -> Result<ProductPatch, AppError> {
        let name = self.name.as_deref().map(required_name).transpose()?;
        let slug = match self.slug.as_deref() {
            Some(slug) => Some(slug_or_derive(Some(slug), name.as_deref().unwrap_or_default())?),
            None => None,
        };
        if let Some(price) = self.price {
            check_price(price)?;
        }
        check_media(
            self.images.as_deref().unwrap_or_default(),
            self.compatibility.as_deref().unwrap_or_default(),
        )?;

        Ok(ProductPatch {
            name,
            slug,
            part_number: self.part_number.map(|s| s.trim().to_owned()),
            description: self.description.map(|s| s.trim().to_owned()),
            price: self.price,
            images: self.images,
            compatibility: self.compatibility,
            brand_id: self.brand_id,
            category_id: self.category_id,
            condition_id: self.condition_id,
            is_active: self.is_active,
            is_featured: self.is_featured,
        })
    }
}

fn check_price(price: Decimal) -> Result<(), AppError> {
    if price < Decimal::ZERO {
        return Err(AppError::BadRequest("price cannot be negative".to_owned()));
    }
    Ok(())
}

fn check_media(images: &[String], compatibility: &[Fitment]) -> Result<(), AppError> {
    if images.len() > MAX_IMAGES {
        return Err(AppError::BadRequest(format!("at most {MAX_IMAGES} images per product")));
    }
    if images.iter().any(|url| url.trim().is_empty()) {
        return Err(AppError::BadRequest("image URLs cannot be blank".to_owned()));
    }
    if compatibility.len() > MAX_FITMENTS {
        return Err(AppError::BadRequest(format!(
            "at most {MAX_FITMENTS} fitment entries per product"
        )));
    }
    for fitment in compatibility {
        fitment.validate().map_err(AppError::BadRequest)?;
    }
    Ok(())
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}

/// GET /api/admin/products
async fn list(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    Query(mut filter): Query<ProductFilter>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Page<Product>>, AppError> {
    user.require(Permission::ManageCatalog)?;
    filter.include_inactive = true;
    let (items, total) = ProductRepository::new(state.pool())
        .list(&filter, pagination)
        .await?;
    Ok(Json(Page::new(items, total, pagination)))
}

/// POST /api/admin/products
#[instrument(skip_all, fields(staff_id = %user.id))]
async fn create(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    user.require(Permission::ManageCatalog)?;
    let new = req.into_new_product()?;
    let product = ProductRepository::new(state.pool()).create(&new).await?;
    tracing::info!(product_id = %product.id, slug = %product.slug, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /api/admin/products/{id}
async fn show(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>, AppError> {
    user.require(Permission::ManageCatalog)?;
    let product = ProductRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id} not found")))?;
    Ok(Json(product))
}

/// PATCH /api/admin/products/{id}
#[instrument(skip_all, fields(staff_id = %user.id, product_id = %id))]
async fn update(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<Json<Product>, AppError> {
    user.require(Permission::ManageCatalog)?;
    let patch = req.into_patch()?;
    let product = ProductRepository::new(state.pool()).update(id, &patch).await?;
    tracing::info!("Product updated");
    Ok(Json(product))
}

/// DELETE /api/admin/products/{id}
#[instrument(skip_all, fields(staff_id = %user.id, product_id = %id))]
async fn remove(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<StatusCode, AppError> {
    user.require(Permission::ManageCatalog)?;
    ProductRepository::new(state.pool()).delete(id).await?;
    tracing::info!("Product deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct StockAdjustment {
    pub delta: i32,
}

impl StockAdjustment {
    fn validated_delta(&self) -> Result<i32, AppError> {
        if self.delta == 0 || self.delta.unsigned_abs() > MAX_STOCK_DELTA.unsigned_abs() {
            return Err(AppError::BadRequest(format!(
                "delta must be non-zero and at most {MAX_STOCK_DELTA} in either direction"
            )));
        }
        Ok(self.delta)
    }
}

/// POST /api/admin/products/{id}/stock
#[instrument(skip_all, fields(staff_id = %user.id, product_id = %id, delta = req.delta))]
async fn adjust_stock(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(req): Json<StockAdjustment>,
) -> Result<Json<Product>, AppError> {
    user.require(Permission::ManageCatalog)?;
    let delta = req.validated_delta()?;
    let product = ProductRepository::new(state.pool())
        .adjust_stock(id, delta)
        .await?;
    tracing::info!(stock = product.stock_quantity, "Stock adjusted");
    Ok(Json(product))
}

#[derive(Debug, Deserialize)]
pub struct LowStockQuery {
    pub threshold: Option<i32>,
}

/// GET /api/admin/products/low-stock
async fn low_stock(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    Query(query): Query<LowStockQuery>,
) -> Result<Json<Vec<Product>>, AppError> {
    user.require(Permission::ManageCatalog)?;
    let threshold = query.threshold.unwrap_or(LOW_STOCK_THRESHOLD).max(0);
    let products = ProductRepository::new(state.pool())
        .low_stock(threshold)
        .await?;
    Ok(Json(products))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request() -> CreateProductRequest {
        serde_json::from_value(serde_json::json!({
            "name": "Front Brake Pads (Bosch)",
            "price": "49.90",
            "brand_id": 1,
            "category_id": 2,
            "condition_id": 3,
        }))
        .unwrap()
    }

    #[test]
    fn test_create_derives_slug_and_defaults() {
        let new = request().into_new_product().unwrap();
        assert_eq!(new.slug, "front-brake-pads-bosch");
        assert!(new.is_active);
        assert!(!new.is_featured);
        assert_eq!(new.stock_quantity, 0);
    }

    #[test]
    fn test_stock_delta_bounds() {
        let delta = |delta| StockAdjustment { delta }.validated_delta();
        assert_eq!(delta(-3).unwrap(), -3);
        assert_eq!(delta(MAX_STOCK_DELTA).unwrap(), MAX_STOCK_DELTA);
        assert!(delta(0).is_err());
        assert!(delta(MAX_STOCK_DELTA + 1).is_err());
        assert!(delta(2_000_000_000).is_err());
        assert!(delta(i32::MIN).is_err());
    }

    #[test]
    fn test_create_rejects_bad_input() {
        let mut negative = request();
        negative.price = Decimal::new(-1, 2);
        assert!(negative.into_new_product().is_err());

        let mut bad_slug = request();
        bad_slug.slug = Some("Not A Slug".to_owned());
        assert!(bad_slug.into_new_product().is_err());

        let mut bad_fitment = request();
        bad_fitment.compatibility = vec![Fitment {
            make: "Audi".to_owned(),
            model: "A4".to_owned(),
            year_from: Some(2012),
            year_to: Some(2008),
        }];
        assert!(bad_fitment.into_new_product().is_err());
    }

    #[test]
    fn test_patch_keeps_absent_fields() {
        let patch = UpdateProductRequest {
            price: Some(Decimal::ZERO),
            ..Default::default()
        }
        .into_patch()
        .unwrap();
        assert_eq!(patch.price, Some(Decimal::ZERO));
        assert!(patch.name.is_none());
        assert!(patch.slug.is_none());
    }
}
