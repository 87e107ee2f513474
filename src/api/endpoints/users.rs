//! Account endpoints for the signed-in user.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::accounts::{self, Account, UpdateProfile};
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::authorization::{self, AuthUser};

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// `GET /api/users/me`
pub async fn me(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Account>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(accounts::get_account(&conn, &user.id)?))
}

/// `PATCH /api/users/me`
pub async fn update_me(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthUser>,
    Json(changes): Json<UpdateProfile>,
) -> Result<Json<Account>, ApiError> {
    let mut conn = ctx.core.open_db()?;
    Ok(Json(accounts::update_profile(&mut conn, &user.id, changes)?))
}

/// `POST /api/users/me/password`: also signs the user out everywhere.
pub async fn change_password(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    let mut conn = ctx.core.open_db()?;
    accounts::change_password(&mut conn, &user.id, &req.old_password, &req.new_password)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /api/users/:id`: deactivate own account, or any as superuser.
pub async fn deactivate(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    authorization::can_manage_account(&user, id)?;
    let mut conn = ctx.core.open_db()?;
    accounts::deactivate(&mut conn, &id)?;
    Ok(StatusCode::NO_CONTENT)
}
