//! Brands, categories and conditions.
//!
//! The three tables share a shape (name, slug, description and sometimes an
//! image), so one repository serves all of them through the [`Taxon`] trait.

use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool};

use spareline_core::{BrandId, CategoryId, ConditionId};

use super::RepositoryError;
use crate::models::catalog::{Brand, Category, Condition};

/// A taxonomy table.
pub trait Taxon: for<'r> FromRow<'r, PgRow> + Send + Unpin {
    /// Typed primary key.
    type Id: Into<i32> + Copy + Send;

    const TABLE: &'static str;
    /// Column holding an optional image URL, if the table has one.
    const IMAGE_COLUMN: Option<&'static str>;
    /// Singular noun for error messages.
    const NOUN: &'static str;

    /// Columns selected into the model.
    fn columns() -> String {
        match Self::IMAGE_COLUMN {
            Some(image) => format!("id, name, slug, description, {image}, created_at"),
            None => "id, name, slug, description, created_at".to_owned(),
        }
    }
}

impl Taxon for Brand {
    type Id = BrandId;
    const TABLE: &'static str = "shop.brands";
    const IMAGE_COLUMN: Option<&'static str> = Some("logo_url");
    const NOUN: &'static str = "brand";
}

impl Taxon for Category {
    type Id = CategoryId;
    const TABLE: &'static str = "shop.categories";
    const IMAGE_COLUMN: Option<&'static str> = Some("image_url");
    const NOUN: &'static str = "category";
}

impl Taxon for Condition {
    type Id = ConditionId;
    const TABLE: &'static str = "shop.conditions";
    const IMAGE_COLUMN: Option<&'static str> = None;
    const NOUN: &'static str = "condition";
}

/// Fields for a new brand, category or condition.
#[derive(Debug, Clone)]
pub struct NewTaxon {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    /// Logo or image URL. Ignored for conditions.
    pub image_url: Option<String>,
}

/// Partial update. `None` keeps the stored value; an empty string clears
/// `description` and `image_url`.
#[derive(Debug, Clone, Default)]
pub struct TaxonPatch {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

/// Repository for the catalog taxonomy tables.
pub struct TaxonomyRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> TaxonomyRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All rows ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list<T: Taxon>(&self) -> Result<Vec<T>, RepositoryError> {
        let rows = sqlx::query_as::<_, T>(&format!(
            "SELECT {} FROM {} ORDER BY name ASC",
            T::columns(),
            T::TABLE
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Insert a row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name or slug is taken.
    pub async fn create<T: Taxon>(&self, new: &NewTaxon) -> Result<T, RepositoryError> {
        let sql = match T::IMAGE_COLUMN {
            Some(image) => format!(
                "INSERT INTO {} (name, slug, description, {image}) VALUES ($1, $2, $3, $4) RETURNING {}",
                T::TABLE,
                T::columns()
            ),
            None => format!(
                "INSERT INTO {} (name, slug, description) VALUES ($1, $2, $3) RETURNING {}",
                T::TABLE,
                T::columns()
            ),
        };

        let mut query = sqlx::query_as::<_, T>(&sql)
            .bind(&new.name)
            .bind(&new.slug)
            .bind(&new.description);
        if T::IMAGE_COLUMN.is_some() {
            query = query.bind(&new.image_url);
        }

        query.fetch_one(self.pool).await.map_err(|e| {
            RepositoryError::from_constraint(e, &format!("a {} with this name or slug already exists", T::NOUN))
        })
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown id and
    /// `RepositoryError::Conflict` if the new name or slug is taken.
    pub async fn update<T: Taxon>(&self, id: T::Id, patch: &TaxonPatch) -> Result<T, RepositoryError> {
        let image_set = T::IMAGE_COLUMN
            .map(|image| format!(", {image} = CASE WHEN $5::text IS NULL THEN {image} ELSE NULLIF($5, '') END"))
            .unwrap_or_default();
        let sql = format!(
            r"
            UPDATE {table}
            SET name = COALESCE($2, name),
                slug = COALESCE($3, slug),
                description = CASE WHEN $4::text IS NULL THEN description ELSE NULLIF($4, '') END
                {image_set}
            WHERE id = $1
            RETURNING {columns}
            ",
            table = T::TABLE,
            columns = T::columns(),
        );

        let mut query = sqlx::query_as::<_, T>(&sql)
            .bind(id.into())
            .bind(&patch.name)
            .bind(&patch.slug)
            .bind(&patch.description);
        if T::IMAGE_COLUMN.is_some() {
            query = query.bind(&patch.image_url);
        }

        query
            .fetch_optional(self.pool)
            .await
            .map_err(|e| {
                RepositoryError::from_constraint(e, &format!("a {} with this name or slug already exists", T::NOUN))
            })?
            .ok_or(RepositoryError::NotFound)
    }

    /// Delete a row that no product references.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` while products still use it.
    pub async fn delete<T: Taxon>(&self, id: T::Id) -> Result<(), RepositoryError> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", T::TABLE))
            .bind(id.into())
            .execute(self.pool)
            .await
            .map_err(|e| {
                RepositoryError::from_constraint(e, &format!("this {} is still used by products", T::NOUN))
            })?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_follow_image_column() {
        assert!(Brand::columns().contains("logo_url"));
        assert!(Category::columns().contains("image_url"));
        assert!(!Condition::columns().contains("url"));
    }
}
