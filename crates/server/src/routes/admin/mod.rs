//! Back-office JSON API, mounted under `/api/admin`.
//!
//! Every handler takes [`StaffUser`](crate::middleware::StaffUser) and then
//! checks the permission its area needs.

pub mod chat;
pub mod orders;
pub mod products;
pub mod quotes;
pub mod reviews;
pub mod settings;
pub mod stats;
pub mod taxonomy;
pub mod users;

use axum::Router;

use spareline_core::{is_valid_slug, slugify};

use crate::error::AppError;
use crate::state::AppState;

const MAX_NAME_LENGTH: usize = 200;

/// Build the back-office router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(products::router())
        .merge(taxonomy::router())
        .merge(reviews::router())
        .merge(quotes::router())
        .merge(orders::router())
        .merge(users::router())
        .merge(settings::router())
        .merge(chat::router())
        .merge(stats::router())
}

/// Trimmed, non-blank display name.
fn required_name(raw: &str) -> Result<String, AppError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("name is required".to_owned()));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(AppError::BadRequest(format!(
            "name must be at most {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(name.to_owned())
}

/// Use the given slug if valid, otherwise derive one from `name`.
fn slug_or_derive(slug: Option<&str>, name: &str) -> Result<String, AppError> {
    match slug.map(str::trim).filter(|s| !s.is_empty()) {
        Some(slug) if is_valid_slug(slug) => Ok(slug.to_owned()),
        Some(slug) => Err(AppError::BadRequest(format!(
            "invalid slug {slug:?}: use lowercase letters, digits and single hyphens"
        ))),
        None => {
            let derived = slugify(name);
            if derived.is_empty() {
                Err(AppError::BadRequest(
                    "a slug is required when the name has no letters or digits".to_owned(),
                ))
            } else {
                Ok(derived)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_or_derive() {
        assert_eq!(slug_or_derive(None, "Oil Filter 5W-30").unwrap(), "oil-filter-5w-30");
        assert_eq!(slug_or_derive(Some(" "), "Spark Plug").unwrap(), "spark-plug");
        assert_eq!(slug_or_derive(Some("custom-slug"), "Ignored").unwrap(), "custom-slug");
        assert!(slug_or_derive(Some("Bad Slug"), "x").is_err());
        assert!(slug_or_derive(None, "!!!").is_err());
    }

    #[test]
    fn test_required_name() {
        assert_eq!(required_name("  Bosch ").unwrap(), "Bosch");
        assert!(required_name("   ").is_err());
        assert!(required_name(&"n".repeat(MAX_NAME_LENGTH + 1)).is_err());
    }
}
