//! Data file endpoints.
//!
//! - `GET /api/data-files`: scoped list with filters
//! - `GET|DELETE /api/data-files/:id`
//! - `GET /api/data-files/:id/download`: raw bytes

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, PageQuery, Paginated};
use crate::authorization::AuthUser;
use crate::db::repository;
use crate::models::{DataFile, DataFileFilter};
use crate::prescriptions;

/// `GET /api/data-files`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthUser>,
    Query(page): Query<PageQuery>,
    Query(filter): Query<DataFileFilter>,
) -> Result<Json<Paginated<DataFile>>, ApiError> {
    let page = page.page();
    let conn = ctx.core.open_db()?;
    let rows = repository::list_data_files(&conn, &user.scope(), &filter, &page)?;
    Ok(Json(Paginated::new(rows, page)))
}

/// `GET /api/data-files/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<DataFile>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(prescriptions::get_data_file(&conn, &user, &id)?))
}

/// `DELETE /api/data-files/:id`
pub async fn delete(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let mut conn = ctx.core.open_db()?;
    prescriptions::delete_data_file(&mut conn, ctx.core.media(), &user, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/data-files/:id/download`
pub async fn download(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let file = {
        let conn = ctx.core.open_db()?;
        prescriptions::get_data_file(&conn, &user, &id)?
    };
    let bytes = ctx.core.media().read(&file.stored_name)?;

    let content_type = HeaderValue::from_str(&file.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    // original_name is already sanitized to [A-Za-z0-9._-]
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", file.original_name))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}
