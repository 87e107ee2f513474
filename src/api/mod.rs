//! HTTP API.
//!
//! Routes are nested under `/api/`. Protected routes pass through
//! Rate Limit → Auth → Audit → Handler; registration, login, refresh
//! and health only pass the rate limiter.
//!
//! `api_router()` returns a plain `Router` so it can be mounted on any
//! axum server; `start_server_on()` runs it on its own listener.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use error::ApiError;
pub use router::api_router;
pub use server::{start_server_on, ApiServer, ServerSession};
pub use types::ApiContext;
