//! Account administration: listing, roles and deactivation.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use serde::Deserialize;
use tracing::instrument;

use spareline_core::{Permission, UserId, UserRole};

use crate::db::UserRepository;
use crate::db::users::UserFilter;
use crate::error::AppError;
use crate::middleware::StaffUser;
use crate::models::CurrentUser;
use crate::models::user::User;
use crate::models::{Page, Pagination};
use crate::state::AppState;

/// Build the user administration router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list))
        .route("/users/{id}", get(show))
        .route("/users/{id}/role", post(set_role))
        .route("/users/{id}/active", post(set_active))
}

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub search: Option<String>,
    pub role: Option<UserRole>,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: UserRole,
}

#[derive(Debug, Deserialize)]
pub struct ActiveRequest {
    pub is_active: bool,
}

fn check_role_change(actor: &CurrentUser, target: &User, role: UserRole) -> Result<(), AppError> {
    if actor.id == target.id {
        return Err(AppError::Forbidden("you cannot change your own role".to_owned()));
    }
    if !actor.role.can_assign(target.role, role) {
        return Err(AppError::Forbidden(format!(
            "{} cannot move a {} to {}",
            actor.role, target.role, role
        )));
    }
    Ok(())
}

fn check_activation(actor: &CurrentUser, target: &User) -> Result<(), AppError> {
    if actor.id == target.id {
        return Err(AppError::Forbidden(
            "you cannot change your own account status".to_owned(),
        ));
    }
    if !actor.role.can_manage(target.role) {
        return Err(AppError::Forbidden(format!(
            "{} cannot manage a {}",
            actor.role, target.role
        )));
    }
    Ok(())
}

async fn load(state: &AppState, id: UserId) -> Result<User, AppError> {
    UserRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {id} not found")))
}

async fn list(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Page<User>>, AppError> {
    user.require(Permission::ManageUsers)?;
    let filter = UserFilter {
        search: query
            .search
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty()),
        role: query.role,
    };
    let (items, total) = UserRepository::new(state.pool())
        .list(&filter, pagination)
        .await?;
    Ok(Json(Page::new(items, total, pagination)))
}

async fn show(
    StaffUser(user): StaffUser,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<Json<User>, AppError> {
    user.require(Permission::ManageUsers)?;
    Ok(Json(load(&state, id).await?))
}

#[instrument(skip_all, fields(staff_id = %actor.id, user_id = %id, role = %req.role))]
async fn set_role(
    StaffUser(actor): StaffUser,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Json(req): Json<RoleRequest>,
) -> Result<Json<User>, AppError> {
    actor.require(Permission::ManageUsers)?;
    let target = load(&state, id).await?;
    check_role_change(&actor, &target, req.role)?;

    let updated = UserRepository::new(state.pool())
        .set_role(id, req.role)
        .await?;
    tracing::info!(previous = %target.role, "Role changed");
    Ok(Json(updated))
}

#[instrument(skip_all, fields(staff_id = %actor.id, user_id = %id, is_active = req.is_active))]
async fn set_active(
    StaffUser(actor): StaffUser,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Json(req): Json<ActiveRequest>,
) -> Result<Json<User>, AppError> {
    actor.require(Permission::ManageUsers)?;
    let target = load(&state, id).await?;
    check_activation(&actor, &target)?;

    let updated = UserRepository::new(state.pool())
        .set_active(id, req.is_active)
        .await?;
    tracing::info!("Account status changed");
    Ok(Json(updated))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::StatusCode;
    use chrono::Utc;
    use spareline_core::Email;

    use super::*;

    fn actor(id: i32, role: UserRole) -> CurrentUser {
        CurrentUser {
            id: UserId::new(id),
            email: Email::parse("staff@example.com").unwrap(),
            role,
        }
    }

    fn target(id: i32, role: UserRole) -> User {
        User {
            id: UserId::new(id),
            email: Email::parse("someone@example.com").unwrap(),
            first_name: "Sam".to_owned(),
            last_name: "Lee".to_owned(),
            phone: None,
            role,
            is_active: true,
            two_factor_enabled: false,
            garage: Vec::new(),
            addresses: Vec::new(),
            favorites: Vec::new(),
            last_login_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_nobody_changes_own_role() {
        let me = actor(1, UserRole::SuperAdmin);
        let err = check_role_change(&me, &target(1, UserRole::SuperAdmin), UserRole::Admin).unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_admin_must_outrank_both_roles() {
        let admin = actor(1, UserRole::Admin);
        assert!(check_role_change(&admin, &target(2, UserRole::Customer), UserRole::SalesManager).is_ok());
        assert!(check_role_change(&admin, &target(2, UserRole::Customer), UserRole::Admin).is_err());
        assert!(check_role_change(&admin, &target(2, UserRole::SuperAdmin), UserRole::Customer).is_err());

        let root = actor(1, UserRole::SuperAdmin);
        assert!(check_role_change(&root, &target(2, UserRole::Admin), UserRole::SuperAdmin).is_ok());
    }

    #[test]
    fn test_activation_rules() {
        let admin = actor(1, UserRole::Admin);
        assert!(check_activation(&admin, &target(1, UserRole::Admin)).is_err());
        assert!(check_activation(&admin, &target(2, UserRole::InventoryStaff)).is_ok());
        assert!(check_activation(&admin, &target(2, UserRole::Admin)).is_err());
    }
}
