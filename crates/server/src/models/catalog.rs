//! Catalog models: brands, categories, conditions, products and reviews.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use spareline_core::{BrandId, CategoryId, ConditionId, ProductId, ReviewId, UserId};

/// A parts manufacturer.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Brand {
    pub id: BrandId,
    pub name: String,
    pub slug: String,
    pub logo_url: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A product category (brakes, filters, lighting...).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Item condition: new, used, refurbished and so on.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Condition {
    pub id: ConditionId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Vehicles a part is known to fit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fitment {
    pub make: String,
    pub model: String,
    #[serde(default)]
    pub year_from: Option<i32>,
    #[serde(default)]
    pub year_to: Option<i32>,
}

impl Fitment {
    /// # Errors
    ///
    /// Returns a message if make/model are blank or the year range is inverted.
    pub fn validate(&self) -> Result<(), String> {
        if self.make.trim().is_empty() || self.model.trim().is_empty() {
            return Err("fitment make and model are required".to_owned());
        }
        if let (Some(from), Some(to)) = (self.year_from, self.year_to)
            && from > to
        {
            return Err(format!("fitment year_from {from} is after year_to {to}"));
        }
        Ok(())
    }
}

/// Name and slug of a related taxonomy row, embedded in product payloads.
#[derive(Debug, Clone, Serialize)]
pub struct TaxonRef<Id> {
    pub id: Id,
    pub name: String,
    pub slug: String,
}

/// A sellable part.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub part_number: Option<String>,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock_quantity: i32,
    pub images: Vec<String>,
    pub compatibility: Vec<Fitment>,
    pub brand: TaxonRef<BrandId>,
    pub category: TaxonRef<CategoryId>,
    pub condition: TaxonRef<ConditionId>,
    pub is_active: bool,
    pub is_featured: bool,
    pub rating: RatingSummary,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock_quantity > 0
    }
}

/// Average of approved review ratings.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RatingSummary {
    pub average: Option<Decimal>,
    pub count: i64,
}

/// A customer review of a product.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub user_id: UserId,
    pub author_name: String,
    pub rating: i16,
    pub title: Option<String>,
    pub comment: String,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
}

/// Sort orders accepted by the product listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
}

impl ProductSort {
    /// `ORDER BY` clause. Always ends with the id so pages are stable.
    #[must_use]
    pub const fn order_by(self) -> &'static str {
        match self {
            Self::Newest => "p.created_at DESC, p.id DESC",
            Self::PriceAsc => "p.price ASC, p.id ASC",
            Self::PriceDesc => "p.price DESC, p.id DESC",
            Self::Name => "p.name ASC, p.id ASC",
        }
    }
}

/// Product listing filters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    pub search: Option<String>,
    /// Brand slug.
    pub brand: Option<String>,
    /// Category slug.
    pub category: Option<String>,
    /// Condition slug.
    pub condition: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub in_stock: Option<bool>,
    pub featured: Option<bool>,
    /// Restrict to vehicles of this make (matched against fitment data).
    pub make: Option<String>,
    #[serde(default)]
    pub sort: ProductSort,
    /// Staff listings include inactive products.
    #[serde(skip)]
    pub include_inactive: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fitment_validation() {
        let ok = Fitment {
            make: "VW".to_owned(),
            model: "Golf".to_owned(),
            year_from: Some(2009),
            year_to: Some(2012),
        };
        assert!(ok.validate().is_ok());

        let inverted = Fitment {
            year_from: Some(2013),
            ..ok
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_sort_is_stable() {
        for sort in [
            ProductSort::Newest,
            ProductSort::PriceAsc,
            ProductSort::PriceDesc,
            ProductSort::Name,
        ] {
            assert!(sort.order_by().contains("p.id"));
        }
    }
}
