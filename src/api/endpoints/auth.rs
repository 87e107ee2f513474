//! Authentication endpoints.
//!
//! - `POST /api/auth/register/doctor`, `POST /api/auth/register/patient`
//! - `POST /api/auth/login` (per-email lockout)
//! - `POST /api/auth/refresh`
//! - `POST /api/auth/logout` (protected)

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;

use crate::accounts::{self, AccountError, LoginResponse, RefreshResponse, RegisterDoctor, RegisterPatient};
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::authorization::AuthUser;
use crate::models::{DoctorProfile, PatientProfile};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

/// `POST /api/auth/register/doctor`
pub async fn register_doctor(
    State(ctx): State<ApiContext>,
    Json(req): Json<RegisterDoctor>,
) -> Result<(StatusCode, Json<DoctorProfile>), ApiError> {
    let mut conn = ctx.core.open_db()?;
    let profile = accounts::register_doctor(&mut conn, req)?;
    ctx.core
        .log_access(Some(profile.user.id), "register", &format!("doctor:{}", profile.user.id));
    Ok((StatusCode::CREATED, Json(profile)))
}

/// `POST /api/auth/register/patient`
pub async fn register_patient(
    State(ctx): State<ApiContext>,
    Json(req): Json<RegisterPatient>,
) -> Result<(StatusCode, Json<PatientProfile>), ApiError> {
    let mut conn = ctx.core.open_db()?;
    let profile = accounts::register_patient(&mut conn, req)?;
    ctx.core
        .log_access(Some(profile.user.id), "register", &format!("patient:{}", profile.user.id));
    Ok((StatusCode::CREATED, Json(profile)))
}

/// `POST /api/auth/login`: returns the user plus an access/refresh pair.
///
/// Five failures for the same email within 15 minutes lock it out with 429.
pub async fn login(
    State(ctx): State<ApiContext>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    // MutexGuard is !Send, keep it scoped
    {
        let mut lockout = ctx
            .login_lockout
            .lock()
            .map_err(|_| ApiError::Internal("login lockout lock".into()))?;
        lockout
            .check(&req.email)
            .map_err(|retry_after| ApiError::RateLimited { retry_after })?;
    }

    let conn = ctx.core.open_db()?;
    let result = accounts::login(&conn, ctx.core.keys(), ctx.core.ttl(), &req.email, &req.password);

    if let Ok(mut lockout) = ctx.login_lockout.lock() {
        match &result {
            Ok(_) => lockout.clear(&req.email),
            Err(AccountError::InvalidCredentials) => lockout.record_failure(&req.email),
            Err(_) => {}
        }
    }

    let response = result?;
    ctx.core
        .log_access(Some(response.user.id), "login", &format!("user:{}", response.user.id));
    Ok(Json(response))
}

/// `POST /api/auth/refresh`: new access token from a live refresh token.
pub async fn refresh(
    State(ctx): State<ApiContext>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    let response = accounts::refresh(&conn, ctx.core.keys(), ctx.core.ttl(), &req.refresh)?;
    Ok(Json(response))
}

/// `POST /api/auth/logout`: revokes every token of the caller.
pub async fn logout(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthUser>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.core.open_db()?;
    accounts::logout(&conn, &user.id)?;
    Ok(StatusCode::NO_CONTENT)
}
