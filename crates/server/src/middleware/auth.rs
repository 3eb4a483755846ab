//! Authentication extractors.
//!
//! `RequireAuth` and `OptionalAuth` read the identity stored in the session at
//! login. `StaffUser` goes further and reloads the account, so a demotion or
//! deactivation takes effect on the next back-office request.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use crate::db::UserRepository;
use crate::error::AppError;
use crate::models::session::PendingTwoFactor;
use crate::models::{CurrentUser, session_keys};
use crate::state::AppState;

/// Extractor that requires a signed-in user.
///
/// ```rust,ignore
/// async fn handler(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.email)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        session_user(parts)
            .await
            .map(Self)
            .ok_or_else(|| AppError::Unauthorized("authentication required".to_owned()))
    }
}

/// Extractor that optionally gets the current user.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(session_user(parts).await))
    }
}

/// Extractor for back-office routes: a signed-in, active staff member with
/// the role currently stored in the database.
///
/// Individual handlers still check their permission with
/// [`CurrentUser::require`].
pub struct StaffUser(pub CurrentUser);

impl FromRequestParts<AppState> for StaffUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = parts.extensions.get::<Session>().cloned();
        let snapshot = session_user(parts)
            .await
            .ok_or_else(|| AppError::Unauthorized("authentication required".to_owned()))?;

        let user = UserRepository::new(state.pool()).get_by_id(snapshot.id).await?;
        let Some(user) = user.filter(|u| u.is_active) else {
            if let Some(session) = session {
                // Best effort; the request is rejected either way.
                let _ = session.flush().await;
            }
            return Err(AppError::Unauthorized("session is no longer valid".to_owned()));
        };

        let current = CurrentUser {
            id: user.id,
            email: user.email,
            role: user.role,
        };
        if !current.is_staff() {
            return Err(AppError::Forbidden("staff access required".to_owned()));
        }
        Ok(Self(current))
    }
}

async fn session_user(parts: &Parts) -> Option<CurrentUser> {
    let session = parts.extensions.get::<Session>()?;
    session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
}

/// Store the signed-in user, rotating the session id first.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session
        .remove::<PendingTwoFactor>(session_keys::PENDING_TWO_FACTOR)
        .await?;
    session.insert(session_keys::CURRENT_USER, user).await
}

/// Remember a login that still owes its TOTP code.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_pending_two_factor(
    session: &Session,
    pending: &PendingTwoFactor,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::PENDING_TWO_FACTOR, pending).await
}

/// Read the pending second-factor login, if any.
///
/// # Errors
///
/// Returns an error if the session cannot be read.
pub async fn pending_two_factor(
    session: &Session,
) -> Result<Option<PendingTwoFactor>, tower_sessions::session::Error> {
    session.get(session_keys::PENDING_TWO_FACTOR).await
}

/// Drop all authentication state (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}
