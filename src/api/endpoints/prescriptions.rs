//! Prescription endpoints.
//!
//! - `GET /api/prescriptions`: scoped list with filters
//! - `POST /api/prescriptions`: create with its full day schedule
//! - `GET|PATCH|DELETE /api/prescriptions/:id`
//! - `POST /api/prescriptions/:id/files`: doctor attachment (multipart)

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use uuid::Uuid;

use super::read_upload;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, PageQuery, Paginated};
use crate::authorization::{self, AuthUser, Permission};
use crate::db::repository;
use crate::models::{DataFile, Prescription, PrescriptionFilter};
use crate::prescriptions::{
    self, NewPrescription, PrescriptionDetail, PrescriptionDirector, UpdatePrescription,
};

/// `GET /api/prescriptions`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthUser>,
    Query(page): Query<PageQuery>,
    Query(filter): Query<PrescriptionFilter>,
) -> Result<Json<Paginated<Prescription>>, ApiError> {
    let page = page.page();
    let conn = ctx.core.open_db()?;
    let rows = repository::list_prescriptions(&conn, &user.scope(), &filter, &page)?;
    Ok(Json(Paginated::new(rows, page)))
}

/// `POST /api/prescriptions`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<NewPrescription>,
) -> Result<(StatusCode, Json<PrescriptionDetail>), ApiError> {
    authorization::require(&user, &[Permission::IsDoctor])?;
    let mut conn = ctx.core.open_db()?;
    let prescription = PrescriptionDirector::create(&mut conn, &user, req)?;
    let detail = prescriptions::get_detail(&conn, &user, &prescription.id)?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// `GET /api/prescriptions/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<PrescriptionDetail>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(prescriptions::get_detail(&conn, &user, &id)?))
}

/// `PATCH /api/prescriptions/:id`: text and/or date range.
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePrescription>,
) -> Result<Json<PrescriptionDetail>, ApiError> {
    let mut conn = ctx.core.open_db()?;
    PrescriptionDirector::update(&mut conn, &user, &id, req)?;
    Ok(Json(prescriptions::get_detail(&conn, &user, &id)?))
}

/// `DELETE /api/prescriptions/:id`
pub async fn delete(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let mut conn = ctx.core.open_db()?;
    prescriptions::delete(&mut conn, ctx.core.media(), &user, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/prescriptions/:id/files`
pub async fn attach_file(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<DataFile>), ApiError> {
    let upload = read_upload(multipart).await?;
    let mut conn = ctx.core.open_db()?;
    let file = prescriptions::attach_doctor_file(&mut conn, ctx.core.media(), &user, &id, upload)?;
    Ok((StatusCode::CREATED, Json(file)))
}
