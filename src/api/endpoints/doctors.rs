//! Doctor directory. Any signed-in user may browse active doctors.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, PageQuery, Paginated};
use crate::db::repository;
use crate::models::DoctorProfile;

#[derive(Deserialize)]
pub struct DoctorListQuery {
    pub specialty: Option<String>,
}

/// `GET /api/doctors`
pub async fn list(
    State(ctx): State<ApiContext>,
    Query(page): Query<PageQuery>,
    Query(query): Query<DoctorListQuery>,
) -> Result<Json<Paginated<DoctorProfile>>, ApiError> {
    let page = page.page();
    let conn = ctx.core.open_db()?;
    let rows = repository::list_doctor_profiles(&conn, query.specialty.as_deref(), &page)?;
    Ok(Json(Paginated::new(rows, page)))
}

/// `GET /api/doctors/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<DoctorProfile>, ApiError> {
    let conn = ctx.core.open_db()?;
    repository::get_doctor_profile(&conn, &id)?
        .filter(|d| d.user.is_active)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Doctor not found".into()))
}
