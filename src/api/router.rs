//! API router.
//!
//! Returns a composable `Router` with every route under `/api/`.
//!
//! Middleware stack (outermost → innermost):
//! 1. Auth validator → 2. Per-user rate limiter → 3. Audit logger
//!
//! Registration, login, refresh and health only get the per-peer rate
//! limiter.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Multipart framing allowance on top of the configured file size limit.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Build the API router.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

/// Build the router from a pre-constructed `ApiContext`, for tests that
/// need to reach into the shared throttling state.
#[cfg(test)]
pub(crate) fn api_router_with_ctx(ctx: ApiContext) -> Router {
    build_router(ctx)
}

fn build_router(ctx: ApiContext) -> Router {
    let body_limit = ctx
        .core
        .config
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    // Layers apply bottom (innermost) to top (outermost):
    //   Extension → Auth → Rate limit → Audit → Handler
    // Path params use `:param` syntax (axum 0.7).
    let protected = Router::new()
        .route("/auth/logout", post(endpoints::auth::logout))
        .route(
            "/users/me",
            get(endpoints::users::me).patch(endpoints::users::update_me),
        )
        .route("/users/me/password", post(endpoints::users::change_password))
        .route("/users/:id", axum::routing::delete(endpoints::users::deactivate))
        .route("/doctors", get(endpoints::doctors::list))
        .route("/doctors/:id", get(endpoints::doctors::detail))
        .route("/patients", get(endpoints::patients::list))
        .route("/patients/:id", get(endpoints::patients::detail))
        .route(
            "/prescriptions",
            get(endpoints::prescriptions::list).post(endpoints::prescriptions::create),
        )
        .route(
            "/prescriptions/:id",
            get(endpoints::prescriptions::detail)
                .patch(endpoints::prescriptions::update)
                .delete(endpoints::prescriptions::delete),
        )
        .route(
            "/prescriptions/:id/files",
            post(endpoints::prescriptions::attach_file),
        )
        .route("/file-prescriptions", get(endpoints::file_prescriptions::list))
        .route(
            "/file-prescriptions/:id",
            get(endpoints::file_prescriptions::detail).patch(endpoints::file_prescriptions::review),
        )
        .route(
            "/file-prescriptions/:id/files",
            post(endpoints::file_prescriptions::upload),
        )
        .route("/data-files", get(endpoints::data_files::list))
        .route(
            "/data-files/:id",
            get(endpoints::data_files::detail).delete(endpoints::data_files::delete),
        )
        .route("/data-files/:id/download", get(endpoints::data_files::download))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::rate::limit_by_user))
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        .layer(axum::Extension(ctx.clone()));

    let unprotected = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/auth/register/doctor", post(endpoints::auth::register_doctor))
        .route("/auth/register/patient", post(endpoints::auth::register_patient))
        .route("/auth/login", post(endpoints::auth::login))
        .route("/auth/refresh", post(endpoints::auth::refresh))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::rate::limit_by_peer))
        .layer(axum::Extension(ctx));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    Router::new()
        .nest("/api", protected)
        .nest("/api", unprotected)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(cors)
}
