//! Registration, login with optional TOTP second factor, and logout.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use crate::db::UserRepository;
use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::middleware::{
    RequireAuth, clear_current_user, pending_two_factor, set_current_user, set_pending_two_factor,
};
use crate::models::CurrentUser;
use crate::models::session::PendingTwoFactor;
use crate::models::user::User;
use crate::services::auth::{AuthError, AuthService, LoginOutcome, Registration};
use crate::state::AppState;

/// Seconds a password-verified login may wait for its TOTP code.
const PENDING_TWO_FACTOR_TTL_SECONDS: i64 = 5 * 60;
/// Wrong codes allowed before the pending login is dropped.
const MAX_TWO_FACTOR_ATTEMPTS: u8 = 5;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct CodeRequest {
    pub code: String,
}

/// Login result.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoginResponse {
    Authenticated { user: User },
    TwoFactorRequired,
}

/// POST /api/auth/register
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<RegisterRequest>,
) -> Result<Response, AppError> {
    let user = AuthService::new(state.pool())
        .register(&Registration {
            email: &req.email,
            password: &req.password,
            first_name: &req.first_name,
            last_name: &req.last_name,
            phone: req.phone.as_deref(),
        })
        .await?;

    tracing::info!(user_id = %user.id, "Customer registered");
    state.mail().send_welcome(&user);
    sign_in(&session, &user).await?;
    Ok((StatusCode::CREATED, Json(user)).into_response())
}

/// POST /api/auth/login
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let outcome = AuthService::new(state.pool())
        .login(&req.email, &req.password)
        .await
        .inspect_err(|e| {
            if matches!(e, AuthError::InvalidCredentials) {
                tracing::info!("Failed login attempt");
            }
        })?;

    match outcome {
        LoginOutcome::Authenticated(user) => {
            sign_in(&session, &user).await?;
            Ok(Json(LoginResponse::Authenticated { user }))
        }
        LoginOutcome::TwoFactorRequired(user) => {
            clear_current_user(&session).await?;
            set_pending_two_factor(
                &session,
                &PendingTwoFactor {
                    user_id: user.id,
                    expires_at: Utc::now().timestamp() + PENDING_TWO_FACTOR_TTL_SECONDS,
                    attempts: 0,
                },
            )
            .await?;
            Ok(Json(LoginResponse::TwoFactorRequired))
        }
    }
}

/// POST /api/auth/2fa/verify
#[instrument(skip_all)]
pub async fn verify_two_factor(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<CodeRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let mut pending = pending_two_factor(&session)
        .await?
        .filter(|p| p.expires_at > Utc::now().timestamp())
        .ok_or(AuthError::NoPendingTwoFactor)?;

    match AuthService::new(state.pool())
        .complete_two_factor(pending.user_id, &req.code)
        .await
    {
        Ok(user) => {
            sign_in(&session, &user).await?;
            Ok(Json(LoginResponse::Authenticated { user }))
        }
        Err(AuthError::InvalidTwoFactorCode) => {
            pending.attempts += 1;
            if pending.attempts >= MAX_TWO_FACTOR_ATTEMPTS {
                clear_current_user(&session).await?;
                tracing::warn!(user_id = %pending.user_id, "Too many invalid two-factor codes");
                return Err(AuthError::TooManyTwoFactorAttempts.into());
            }
            set_pending_two_factor(&session, &pending).await?;
            Err(AuthError::InvalidTwoFactorCode.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// POST /api/auth/logout
pub async fn logout(session: Session) -> Result<StatusCode, AppError> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<Json<User>, AppError> {
    let user = UserRepository::new(state.pool())
        .get_by_id(current.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("session is no longer valid".to_owned()))?;
    Ok(Json(user))
}

async fn sign_in(session: &Session, user: &User) -> Result<(), AppError> {
    set_current_user(
        session,
        &CurrentUser {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
        },
    )
    .await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    Ok(())
}
