//! Per-client rate limiting middleware.
//!
//! Sliding-window limits per client key:
//! - 100 requests per minute
//! - 1000 requests per hour
//!
//! Public routes are keyed by peer address. Protected routes are keyed by
//! the authenticated user, so this layer sits inside `require_auth` there.
//! Nothing the client sends unverified ever picks the bucket.

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::authorization::AuthUser;

fn peer_key(req: &Request<axum::body::Body>) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| format!("ip:{}", addr.ip()))
        .unwrap_or_else(|| "anonymous".to_string())
}

/// Verified user id when auth ran, else the peer address.
fn user_key(req: &Request<axum::body::Body>) -> String {
    match req.extensions().get::<AuthUser>() {
        Some(user) => format!("user:{}", user.id),
        None => peer_key(req),
    }
}

/// Limit unauthenticated routes per peer address.
pub async fn limit_by_peer(req: Request<axum::body::Body>, next: Next) -> Response {
    let key = peer_key(&req);
    match limit_inner(req, next, key).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

/// Limit protected routes per authenticated user.
pub async fn limit_by_user(req: Request<axum::body::Body>, next: Next) -> Response {
    let key = user_key(&req);
    match limit_inner(req, next, key).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

/// Returns 429 with `Retry-After` once `key` exceeds its window.
async fn limit_inner(
    req: Request<axum::body::Body>,
    next: Next,
    key: String,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    // MutexGuard is !Send, drop before .await
    {
        let mut limiter = ctx
            .rate_limiter
            .lock()
            .map_err(|_| ApiError::Internal("rate limiter lock".into()))?;

        limiter
            .check(&key)
            .map_err(|retry_after| ApiError::RateLimited { retry_after })?;
    }

    Ok(next.run(req).await)
}
