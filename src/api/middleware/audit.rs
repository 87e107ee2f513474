//! Audit logging middleware.
//!
//! Logs every protected request with the caller, method, path and
//! response status. Runs innermost (after auth has injected `AuthUser`).

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::ApiContext;
use crate::authorization::AuthUser;

/// Record the request in the buffered audit log once the handler answered.
pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    let ctx = req.extensions().get::<ApiContext>().cloned();
    let user_id = req.extensions().get::<AuthUser>().map(|u| u.id);

    let response = next.run(req).await;

    if let Some(ctx) = ctx {
        let status = response.status().as_u16();
        ctx.core
            .log_access(user_id, &format!("{method} {path}"), &format!("status:{status}"));
    }

    response
}
