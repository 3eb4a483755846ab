//! Authentication error types.

use axum::http::StatusCode;
use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] spareline_core::EmailError),

    /// Wrong password or unknown email.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// Account deactivated by staff.
    #[error("this account has been disabled")]
    AccountDisabled,

    /// User already exists.
    #[error("an account with this email already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("{0}")]
    WeakPassword(String),

    /// Profile field failed validation.
    #[error("{0}")]
    InvalidInput(String),

    /// TOTP code did not match.
    #[error("invalid two-factor code")]
    InvalidTwoFactorCode,

    /// No pending two-factor login in this session, or it expired.
    #[error("no pending two-factor login; sign in again")]
    NoPendingTwoFactor,

    /// Too many wrong codes for one pending login.
    #[error("too many invalid codes; sign in again")]
    TooManyTwoFactorAttempts,

    /// Enable/disable called in the wrong state.
    #[error("{0}")]
    TwoFactorState(&'static str),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

impl AuthError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidEmail(_) | Self::WeakPassword(_) | Self::InvalidInput(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::InvalidCredentials
            | Self::AccountDisabled
            | Self::InvalidTwoFactorCode
            | Self::NoPendingTwoFactor
            | Self::TooManyTwoFactorAttempts => StatusCode::UNAUTHORIZED,
            Self::UserAlreadyExists | Self::TwoFactorState(_) => StatusCode::CONFLICT,
            Self::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            Self::Repository(RepositoryError::Conflict(_)) => StatusCode::CONFLICT,
            Self::Repository(_) | Self::PasswordHash => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
