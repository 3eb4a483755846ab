//! Authentication service.
//!
//! Password login with optional TOTP second factor, registration, and the
//! account-security operations (password change, two-factor setup).

mod error;
pub mod totp;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use serde::Serialize;
use sqlx::PgPool;

use spareline_core::{Email, UserId, UserRole};

use crate::db::RepositoryError;
use crate::db::users::{NewUser, UserRepository};
use crate::models::user::User;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;
/// Maximum password length accepted before hashing.
const MAX_PASSWORD_LENGTH: usize = 256;
/// Issuer shown in authenticator apps.
const TOTP_ISSUER: &str = "Spareline";

/// Result of checking email and password.
#[derive(Debug)]
pub enum LoginOutcome {
    /// Fully signed in.
    Authenticated(User),
    /// Password accepted; a TOTP code is still required.
    TwoFactorRequired(User),
}

/// Registration input after JSON parsing.
#[derive(Debug, Clone)]
pub struct Registration<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub phone: Option<&'a str>,
}

/// Secret and provisioning URI returned by two-factor setup.
#[derive(Debug, Clone, Serialize)]
pub struct TwoFactorSetup {
    pub secret: String,
    pub otpauth_uri: String,
}

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// Register a customer account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail`, `AuthError::WeakPassword` or
    /// `AuthError::InvalidInput` for bad input, and
    /// `AuthError::UserAlreadyExists` if the email is taken.
    pub async fn register(&self, registration: &Registration<'_>) -> Result<User, AuthError> {
        let email = Email::parse(registration.email)?;
        validate_password(registration.password)?;
        let first_name = required_name("first name", registration.first_name)?;
        let last_name = required_name("last name", registration.last_name)?;

        let password_hash = hash_password(registration.password)?;
        self.users
            .create(NewUser {
                email: &email,
                password_hash: &password_hash,
                first_name,
                last_name,
                phone: registration.phone.map(str::trim).filter(|p| !p.is_empty()),
                role: UserRole::Customer,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })
    }

    /// Check email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong
    /// and `AuthError::AccountDisabled` for deactivated accounts.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let user = self
            .users
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        let secrets = self.users.get_secrets(user.id).await?;
        verify_password(password, &secrets.password_hash)?;

        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }

        if user.two_factor_enabled {
            return Ok(LoginOutcome::TwoFactorRequired(user));
        }

        self.users.record_login(user.id).await?;
        Ok(LoginOutcome::Authenticated(user))
    }

    /// Finish a login that required a TOTP code.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidTwoFactorCode` for a wrong code.
    pub async fn complete_two_factor(&self, user_id: UserId, code: &str) -> Result<User, AuthError> {
        let user = self.active_user(user_id).await?;
        self.check_code(user_id, code).await?;
        self.users.record_login(user_id).await?;
        Ok(user)
    }

    /// Generate and stage a TOTP secret. It takes effect once confirmed with
    /// [`Self::enable_two_factor`].
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TwoFactorState` if two-factor is already enabled.
    pub async fn begin_two_factor_setup(&self, user: &User) -> Result<TwoFactorSetup, AuthError> {
        if user.two_factor_enabled {
            return Err(AuthError::TwoFactorState("two-factor authentication is already enabled"));
        }
        let secret = totp::generate_secret();
        self.users
            .stage_two_factor_secret(user.id, &secret)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => {
                    AuthError::TwoFactorState("two-factor authentication is already enabled")
                }
                other => AuthError::Repository(other),
            })?;

        let otpauth_uri = totp::otpauth_uri(TOTP_ISSUER, user.email.as_str(), &secret);
        Ok(TwoFactorSetup {
            secret,
            otpauth_uri,
        })
    }

    /// Confirm the staged secret with a valid code.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TwoFactorState` when already enabled or not set up,
    /// and `AuthError::InvalidTwoFactorCode` for a wrong code.
    pub async fn enable_two_factor(&self, user_id: UserId, code: &str) -> Result<(), AuthError> {
        let user = self.active_user(user_id).await?;
        if user.two_factor_enabled {
            return Err(AuthError::TwoFactorState("two-factor authentication is already enabled"));
        }
        self.check_code(user_id, code).await?;
        self.users.set_two_factor_enabled(user_id, true).await?;
        Ok(())
    }

    /// Turn two-factor off. Requires a current code.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TwoFactorState` if it is not enabled and
    /// `AuthError::InvalidTwoFactorCode` for a wrong code.
    pub async fn disable_two_factor(&self, user_id: UserId, code: &str) -> Result<(), AuthError> {
        let user = self.active_user(user_id).await?;
        if !user.two_factor_enabled {
            return Err(AuthError::TwoFactorState("two-factor authentication is not enabled"));
        }
        self.check_code(user_id, code).await?;
        self.users.set_two_factor_enabled(user_id, false).await?;
        Ok(())
    }

    /// Change the password after re-checking the current one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if `current` is wrong and
    /// `AuthError::WeakPassword` if `new` is too short.
    pub async fn change_password(&self, user_id: UserId, current: &str, new: &str) -> Result<(), AuthError> {
        let secrets = self.users.get_secrets(user_id).await?;
        verify_password(current, &secrets.password_hash)?;
        validate_password(new)?;
        let hash = hash_password(new)?;
        self.users.update_password(user_id, &hash).await?;
        Ok(())
    }

    async fn active_user(&self, user_id: UserId) -> Result<User, AuthError> {
        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }
        Ok(user)
    }

    async fn check_code(&self, user_id: UserId, code: &str) -> Result<(), AuthError> {
        let secrets = self.users.get_secrets(user_id).await?;
        let secret = secrets
            .two_factor_secret
            .ok_or(AuthError::TwoFactorState("two-factor authentication has not been set up"))?;
        let now = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
        if totp::verify(&secret, code, now) {
            Ok(())
        } else {
            Err(AuthError::InvalidTwoFactorCode)
        }
    }
}

/// Check password length limits.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` with a user-facing message.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if length > MAX_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at most {MAX_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

fn required_name<'n>(field: &str, value: &'n str) -> Result<&'n str, AuthError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AuthError::InvalidInput(format!("{field} is required")));
    }
    if trimmed.chars().count() > 100 {
        return Err(AuthError::InvalidInput(format!("{field} must be at most 100 characters")));
    }
    Ok(trimmed)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_password_length_rules() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("longenough").is_ok());
        assert!(validate_password(&"x".repeat(MAX_PASSWORD_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            verify_password("anything", "not-a-hash"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_required_name() {
        assert_eq!(required_name("first name", "  Ana ").unwrap(), "Ana");
        assert!(required_name("first name", "   ").is_err());
    }
}
