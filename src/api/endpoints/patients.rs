//! Patient directory.
//!
//! Doctors and superusers can list patients (to write prescriptions for
//! them); a patient can only read their own record.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, PageQuery, Paginated};
use crate::authorization::{self, AuthUser, Permission};
use crate::db::repository;
use crate::models::PatientProfile;

#[derive(Deserialize)]
pub struct PatientListQuery {
    pub search: Option<String>,
}

/// `GET /api/patients`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthUser>,
    Query(page): Query<PageQuery>,
    Query(query): Query<PatientListQuery>,
) -> Result<Json<Paginated<PatientProfile>>, ApiError> {
    authorization::require(&user, &[Permission::IsDoctor])?;
    let page = page.page();
    let conn = ctx.core.open_db()?;
    let rows = repository::list_patient_profiles(&conn, query.search.as_deref(), &page)?;
    Ok(Json(Paginated::new(rows, page)))
}

/// `GET /api/patients/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<PatientProfile>, ApiError> {
    authorization::can_read_patient(&user, id)?;
    let conn = ctx.core.open_db()?;
    repository::get_patient_profile(&conn, &id)?
        .filter(|p| p.user.is_active)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Patient not found".into()))
}
