//! Self-service account routes: profile, password, two-factor, garage,
//! address book, favorites, and the customer's own quotes and orders.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use spareline_core::ProductId;

use crate::db::{ProductRepository, UserRepository};
use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::CurrentUser;
use crate::models::catalog::Product;
use crate::models::order::Order;
use crate::models::quote::Quote;
use crate::models::user::{Address, MAX_PROFILE_ENTRIES, User, Vehicle, normalize_default_address};
use crate::services::auth::{AuthService, TwoFactorSetup, validate_password};
use crate::services::orders::OrderService;
use crate::services::quotes::QuoteService;
use crate::state::AppState;

const MAX_NAME_LENGTH: usize = 100;
const MAX_PHONE_LENGTH: usize = 40;

#[derive(Debug, Deserialize)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// An empty string clears the phone number.
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct CodeRequest {
    pub code: String,
}

async fn load_user(state: &AppState, current: &CurrentUser) -> Result<User, AppError> {
    UserRepository::new(state.pool())
        .get_by_id(current.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("session is no longer valid".to_owned()))
}

/// PATCH /api/account/profile
#[instrument(skip_all, fields(user_id = %current.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<User>, AppError> {
    let first_name = profile_field("first_name", update.first_name.as_deref(), MAX_NAME_LENGTH, true)?;
    let last_name = profile_field("last_name", update.last_name.as_deref(), MAX_NAME_LENGTH, true)?;
    let phone = profile_field("phone", update.phone.as_deref(), MAX_PHONE_LENGTH, false)?;

    let user = UserRepository::new(state.pool())
        .update_profile(current.id, first_name, last_name, phone)
        .await?;
    Ok(Json(user))
}

/// Trim a profile field. Required fields may be omitted but not blanked.
fn profile_field<'a>(
    field: &str,
    value: Option<&'a str>,
    max: usize,
    required: bool,
) -> Result<Option<&'a str>, AppError> {
    let Some(value) = value.map(str::trim) else {
        return Ok(None);
    };
    if required && value.is_empty() {
        return Err(AppError::BadRequest(format!("{field} cannot be blank")));
    }
    if value.chars().count() > max {
        return Err(AppError::BadRequest(format!("{field} must be at most {max} characters")));
    }
    Ok(Some(value))
}

/// POST /api/account/password
#[instrument(skip_all, fields(user_id = %current.id))]
pub async fn change_password(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Json(req): Json<PasswordChange>,
) -> Result<StatusCode, AppError> {
    validate_password(&req.new_password)?;
    AuthService::new(state.pool())
        .change_password(current.id, &req.current_password, &req.new_password)
        .await?;
    tracing::info!("Password changed");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/account/2fa/setup
pub async fn two_factor_setup(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<Json<TwoFactorSetup>, AppError> {
    let user = load_user(&state, &current).await?;
    let setup = AuthService::new(state.pool()).begin_two_factor_setup(&user).await?;
    Ok(Json(setup))
}

/// POST /api/account/2fa/enable
#[instrument(skip_all, fields(user_id = %current.id))]
pub async fn two_factor_enable(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Json(req): Json<CodeRequest>,
) -> Result<Json<User>, AppError> {
    AuthService::new(state.pool())
        .enable_two_factor(current.id, &req.code)
        .await?;
    tracing::info!("Two-factor authentication enabled");
    Ok(Json(load_user(&state, &current).await?))
}

/// POST /api/account/2fa/disable
#[instrument(skip_all, fields(user_id = %current.id))]
pub async fn two_factor_disable(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Json(req): Json<CodeRequest>,
) -> Result<Json<User>, AppError> {
    AuthService::new(state.pool())
        .disable_two_factor(current.id, &req.code)
        .await?;
    tracing::info!("Two-factor authentication disabled");
    Ok(Json(load_user(&state, &current).await?))
}

/// PUT /api/account/garage
pub async fn replace_garage(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Json(garage): Json<Vec<Vehicle>>,
) -> Result<Json<User>, AppError> {
    check_entry_count("garage", garage.len())?;
    for vehicle in &garage {
        vehicle.validate().map_err(AppError::BadRequest)?;
    }
    let user = UserRepository::new(state.pool())
        .replace_garage(current.id, &garage)
        .await?;
    Ok(Json(user))
}

/// PUT /api/account/addresses
pub async fn replace_addresses(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Json(mut addresses): Json<Vec<Address>>,
) -> Result<Json<User>, AppError> {
    check_entry_count("address book", addresses.len())?;
    for address in &addresses {
        address.validate().map_err(AppError::BadRequest)?;
    }
    normalize_default_address(&mut addresses);
    let user = UserRepository::new(state.pool())
        .replace_addresses(current.id, &addresses)
        .await?;
    Ok(Json(user))
}

fn check_entry_count(what: &str, count: usize) -> Result<(), AppError> {
    if count > MAX_PROFILE_ENTRIES {
        return Err(AppError::BadRequest(format!(
            "{what} can hold at most {MAX_PROFILE_ENTRIES} entries"
        )));
    }
    Ok(())
}

/// GET /api/account/favorites
pub async fn favorites(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<Json<Vec<Product>>, AppError> {
    let user = load_user(&state, &current).await?;
    let products = ProductRepository::new(state.pool())
        .list_active_by_ids(&user.favorites)
        .await?;
    Ok(Json(products))
}

/// POST /api/account/favorites/{product_id}
///
/// Adds the product if absent, removes it otherwise. Returns the new list.
pub async fn toggle_favorite(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    Path(product_id): Path<ProductId>,
) -> Result<Json<Vec<ProductId>>, AppError> {
    let user = load_user(&state, &current).await?;
    if !user.favorites.contains(&product_id)
        && !ProductRepository::new(state.pool()).is_active(product_id).await?
    {
        return Err(AppError::NotFound("product not found".to_owned()));
    }

    let favorites = UserRepository::new(state.pool())
        .toggle_favorite(current.id, product_id)
        .await?;
    Ok(Json(favorites))
}

/// GET /api/account/quotes
pub async fn quotes(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<Json<Vec<Quote>>, AppError> {
    let quotes = QuoteService::new(state.pool(), state.mail(), &state.config().quotes)
        .list_for_user(current.id)
        .await?;
    Ok(Json(quotes))
}

/// GET /api/account/orders
pub async fn orders(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<Json<Vec<Order>>, AppError> {
    let orders = OrderService::new(state.pool(), state.mail())
        .list_for_user(current.id)
        .await?;
    Ok(Json(orders))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_field_rules() {
        assert_eq!(profile_field("first_name", None, 10, true).unwrap(), None);
        assert_eq!(profile_field("first_name", Some(" Ana "), 10, true).unwrap(), Some("Ana"));
        assert!(profile_field("first_name", Some("  "), 10, true).is_err());
        assert_eq!(profile_field("phone", Some(""), 10, false).unwrap(), Some(""));
        assert!(profile_field("phone", Some("12345678901"), 10, false).is_err());
    }

    #[test]
    fn test_entry_limit() {
        assert!(check_entry_count("garage", MAX_PROFILE_ENTRIES).is_ok());
        assert!(check_entry_count("garage", MAX_PROFILE_ENTRIES + 1).is_err());
    }
}
