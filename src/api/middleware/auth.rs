//! Bearer token authentication middleware.
//!
//! Extracts `Authorization: Bearer <access token>`, verifies the JWT,
//! then loads the user: the account must be active and the token's
//! session must be the one mirrored in `token_expires_at`. Logout,
//! password change and deactivation clear that column, and every login
//! replaces it, so older tokens never come back. Injects `AuthUser` for
//! downstream handlers.

use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::authorization::AuthUser;
use crate::crypto::{self, TokenKind};
use crate::db::repository;

pub async fn require_auth(req: Request<axum::body::Body>, next: Next) -> Response {
    match require_auth_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn require_auth_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let token = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    let claims = crypto::decode_token(token, TokenKind::Access, ctx.core.keys())?;
    let user_id = claims.user_id()?;

    let conn = ctx.core.open_db()?;
    let user = repository::get_user(&conn, &user_id)?.ok_or(ApiError::Unauthorized)?;
    drop(conn);

    if !user.accepts_session(claims.session, Utc::now()) {
        tracing::debug!(user_id = %user.id, "Rejected revoked token");
        return Err(ApiError::Unauthorized);
    }

    // Role and superuser come from the row, not the token.
    req.extensions_mut().insert(AuthUser::from(&user));

    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert("Cache-Control", HeaderValue::from_static("no-store"));

    Ok(response)
}
