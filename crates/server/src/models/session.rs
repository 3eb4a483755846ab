//! Session-related types.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use spareline_core::{Email, Permission, UserId, UserRole};

use crate::error::AppError;

/// Session-stored user identity.
///
/// The role is a snapshot from login time. Back-office requests go through
/// the `StaffUser` extractor, which reloads it from the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// Role at login time.
    pub role: UserRole,
}

impl CurrentUser {
    /// Require a back-office permission.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Forbidden` when the role lacks `permission`.
    pub fn require(&self, permission: Permission) -> Result<(), AppError> {
        if self.role.has(permission) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "{} role cannot perform this action",
                self.role
            )))
        }
    }

    /// Whether the user is any kind of staff.
    #[must_use]
    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }
}

/// A login that passed the password check but still owes a TOTP code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingTwoFactor {
    pub user_id: UserId,
    /// Unix timestamp after which the pending login is void.
    pub expires_at: i64,
    /// Failed code attempts so far.
    pub attempts: u8,
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for a login waiting on its second factor.
    pub const PENDING_TWO_FACTOR: &str = "pending_two_factor";
}
