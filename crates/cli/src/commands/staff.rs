//! Staff user management commands.
//!
//! The back office has no sign-up flow, so the first `super_admin` is
//! created here. Later staff can be promoted from the admin API.
//!
//! # Environment Variables
//!
//! - `SPARELINE_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//! - `SPARELINE_STAFF_PASSWORD` - Initial password when `--password` is omitted

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use spareline_core::{Email, UserRole};
use spareline_server::db::users::NewUser;
use spareline_server::db::{RepositoryError, UserRepository};
use spareline_server::services::auth::{AuthError, hash_password, validate_password};

use super::{CommandError, connect};

/// Errors that can occur during staff operations.
#[derive(Debug, Error)]
pub enum StaffError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    /// Invalid role.
    #[error("Invalid role: {0}. Valid roles: inventory_staff, sales_manager, admin, super_admin")]
    InvalidRole(String),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// Password rejected or could not be hashed.
    #[error("{0}")]
    Password(#[from] AuthError),

    /// User already exists or the insert failed.
    #[error("{0}")]
    Repository(#[from] RepositoryError),
}

/// Arguments for [`create_user`].
pub struct NewStaff<'a> {
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub role: &'a str,
    pub password: SecretString,
}

/// Parse a role name, refusing `customer`.
fn staff_role(role: &str) -> Result<UserRole, StaffError> {
    match role.parse::<UserRole>() {
        Ok(role) if role.is_staff() => Ok(role),
        _ => Err(StaffError::InvalidRole(role.to_owned())),
    }
}

/// Create a new staff user.
///
/// # Returns
///
/// The ID of the created user.
///
/// # Errors
///
/// Returns `StaffError` if the input is invalid, the email is taken, or the
/// database is unreachable.
pub async fn create_user(new: NewStaff<'_>) -> Result<i32, StaffError> {
    let role = staff_role(new.role)?;
    let email = Email::parse(new.email).map_err(|_| StaffError::InvalidEmail(new.email.to_owned()))?;
    validate_password(new.password.expose_secret())?;
    let password_hash = hash_password(new.password.expose_secret())?;

    let pool = connect().await?;

    tracing::info!("Creating staff user: {} ({})", email, role);

    let user = UserRepository::new(&pool)
        .create(NewUser {
            email: &email,
            password_hash: &password_hash,
            first_name: new.first_name.trim(),
            last_name: new.last_name.trim(),
            phone: None,
            role,
        })
        .await?;

    tracing::info!(
        "Staff user created successfully! ID: {}, Email: {}, Role: {}",
        user.id,
        user.email,
        user.role
    );
    tracing::info!("Two-factor authentication can be enabled from the account settings.");

    Ok(user.id.into())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_staff_role() {
        assert_eq!(staff_role("super_admin").unwrap(), UserRole::SuperAdmin);
        assert_eq!(staff_role("inventory_staff").unwrap(), UserRole::InventoryStaff);
        assert!(matches!(staff_role("customer"), Err(StaffError::InvalidRole(_))));
        assert!(matches!(staff_role("viewer"), Err(StaffError::InvalidRole(_))));
    }
}
