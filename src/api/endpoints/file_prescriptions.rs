//! Scheduled day endpoints.
//!
//! - `GET /api/file-prescriptions`: scoped list with filters
//! - `GET /api/file-prescriptions/:id`: one day with its files
//! - `PATCH /api/file-prescriptions/:id`: doctor review
//! - `POST /api/file-prescriptions/:id/files`: patient upload (multipart)

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use uuid::Uuid;

use super::read_upload;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, PageQuery, Paginated};
use crate::authorization::AuthUser;
use crate::db::repository;
use crate::models::{DataFile, FilePrescription, FilePrescriptionFilter};
use crate::prescriptions::{self, DayDetail, DayReview};

/// `GET /api/file-prescriptions`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthUser>,
    Query(page): Query<PageQuery>,
    Query(filter): Query<FilePrescriptionFilter>,
) -> Result<Json<Paginated<FilePrescription>>, ApiError> {
    let page = page.page();
    let conn = ctx.core.open_db()?;
    let rows = repository::list_file_prescriptions(&conn, &user.scope(), &filter, &page)?;
    Ok(Json(Paginated::new(rows, page)))
}

/// `GET /api/file-prescriptions/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<DayDetail>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(prescriptions::get_day_detail(&conn, &user, &id)?))
}

/// `PATCH /api/file-prescriptions/:id`
pub async fn review(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(review): Json<DayReview>,
) -> Result<Json<DayDetail>, ApiError> {
    let mut conn = ctx.core.open_db()?;
    prescriptions::check_day(&mut conn, &user, &id, review)?;
    Ok(Json(prescriptions::get_day_detail(&conn, &user, &id)?))
}

/// `POST /api/file-prescriptions/:id/files`
pub async fn upload(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<DataFile>), ApiError> {
    let upload = read_upload(multipart).await?;
    let mut conn = ctx.core.open_db()?;
    let today = Utc::now().date_naive();
    let file = prescriptions::upload_patient_file(&mut conn, ctx.core.media(), &user, &id, upload, today)?;
    Ok((StatusCode::CREATED, Json(file)))
}
