//! Brand, category and condition management.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::instrument;

use spareline_core::Permission;

use super::{required_name, slug_or_derive};
use crate::db::TaxonomyRepository;
use crate::db::taxonomy::{NewTaxon, Taxon, TaxonPatch};
use crate::error::AppError;
use crate::middleware::StaffUser;
use crate::models::catalog::{Brand, Category, Condition};
use crate::state::AppState;

/// Build the taxonomy router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(taxon_routes::<Brand>("/brands"))
        .merge(taxon_routes::<Category>("/categories"))
        .merge(taxon_routes::<Condition>("/conditions"))
}

fn taxon_routes<T>(base: &str) -> Router<AppState>
where
    T: Taxon + Serialize + Sync + 'static,
    T::Id: DeserializeOwned + Sync + 'static,
{
    Router::new()
        .route(base, get(list::<T>).post(create::<T>))
        .route(
            &format!("{base}/{{id}}"),
            axum::routing::patch(update::<T>).delete(remove::<T>),
        )
}

#[derive(Debug, Deserialize)]
pub struct TaxonRequest {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Logo for brands, image for categories.
    #[serde(default)]
    pub image_url: Option<String>,
}

impl TaxonRequest {
    fn into_new_taxon(self) -> Result<NewTaxon, AppError> {
        let name = required_name(&self.name)?;
        let slug = slug_or_derive(self.slug.as_deref(), &name)?;
        let image_url = self
            .image_url
            .map(|u| u.trim().to_owned())
            .filter(|u| !u.is_empty());
        if let Some(url) = &image_url {
            check_url(url)?;
        }
        Ok(NewTaxon {
            name,
            slug,
            description: self
                .description
                .map(|d| d.trim().to_owned())
                .filter(|d| !d.is_empty()),
            image_url,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TaxonPatchRequest {
    pub name: Option<String>,
    pub slug: Option<String>,
    /// Empty string clears it.
    pub description: Option<String>,
    /// Empty string clears it.
    pub image_url: Option<String>,
}

impl TaxonPatchRequest {
    fn into_patch(self) -> Result<TaxonPatch, AppError> {
        let name = self.name.as_deref().map(required_name).transpose()?;
        let slug = match self.slug.as_deref() {
            Some(slug) => Some(slug_or_derive(Some(slug), name.as_deref().unwrap_or_default())?),
            None => None,
        };
        let image_url = self.image_url.map(|u| u.trim().to_owned());
        if let Some(url) = image_url.as_deref().filter(|u| !u.is_empty()) {
            check_url(url)?;
        }
        Ok(TaxonPatch {
            name,
            slug,
            description: self.description.map(|d| d.trim().to_owned()),
            image_url,
        })
    }
}

fn check_url(raw: &str) -> Result<(), AppError> {
    match url::Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(AppError::BadRequest(format!("{raw:?} is not an http(s) URL"))),
    }
}

async fn list<T>(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<T>>, AppError>
where
    T: Taxon + Serialize,
{
    user.require(Permission::ManageCatalog)?;
    Ok(Json(TaxonomyRepository::new(state.pool()).list::<T>().await?))
}

#[instrument(skip_all, fields(staff_id = %user.id, kind = T::NOUN))]
async fn create<T>(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    Json(req): Json<TaxonRequest>,
) -> Result<(StatusCode, Json<T>), AppError>
where
    T: Taxon + Serialize,
{
    user.require(Permission::ManageCatalog)?;
    let new = req.into_new_taxon()?;
    let created = TaxonomyRepository::new(state.pool()).create::<T>(&new).await?;
    tracing::info!(slug = %new.slug, "Taxonomy entry created");
    Ok((StatusCode::CREATED, Json(created)))
}

#[instrument(skip_all, fields(staff_id = %user.id, kind = T::NOUN))]
async fn update<T>(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    Path(id): Path<T::Id>,
    Json(req): Json<TaxonPatchRequest>,
) -> Result<Json<T>, AppError>
where
    T: Taxon + Serialize,
{
    user.require(Permission::ManageCatalog)?;
    let patch = req.into_patch()?;
    let updated = TaxonomyRepository::new(state.pool())
        .update::<T>(id, &patch)
        .await?;
    Ok(Json(updated))
}

#[instrument(skip_all, fields(staff_id = %user.id, kind = T::NOUN))]
async fn remove<T>(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    Path(id): Path<T::Id>,
) -> Result<StatusCode, AppError>
where
    T: Taxon,
{
    user.require(Permission::ManageCatalog)?;
    TaxonomyRepository::new(state.pool()).delete::<T>(id).await?;
    tracing::info!("Taxonomy entry deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_taxon_cleanup() {
        let new = TaxonRequest {
            name: " Mann Filter ".to_owned(),
            slug: None,
            description: Some("   ".to_owned()),
            image_url: Some("https://cdn.example.com/mann.png".to_owned()),
        }
        .into_new_taxon()
        .unwrap();
        assert_eq!(new.name, "Mann Filter");
        assert_eq!(new.slug, "mann-filter");
        assert_eq!(new.description, None);
    }

    #[test]
    fn test_image_url_must_be_http() {
        let req = TaxonRequest {
            name: "Mann".to_owned(),
            slug: None,
            description: None,
            image_url: Some("javascript:alert(1)".to_owned()),
        };
        assert!(req.into_new_taxon().is_err());

        let clear = TaxonPatchRequest {
            image_url: Some(String::new()),
            ..Default::default()
        }
        .into_patch()
        .unwrap();
        assert_eq!(clear.image_url.as_deref(), Some(""));
    }
}
