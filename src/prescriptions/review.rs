//! Doctor review of uploaded days.

use chrono::Utc;
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use super::builder::sync_checked;
use super::{load_day, PrescriptionError};
use crate::authorization::{self, AuthUser};
use crate::db::repository;
use crate::models::enums::HealthStatus;
use crate::models::FilePrescription;

const MAX_DESCRIPTION_CHARS: usize = 2000;

#[derive(Debug, Clone, Deserialize)]
pub struct DayReview {
    pub status: HealthStatus,
    #[serde(default)]
    pub description: Option<String>,
}

/// Mark an uploaded day as checked with a health status. The day's files are
/// marked checked and the prescription's aggregate flag is refreshed.
pub fn check_day(
    conn: &mut Connection,
    actor: &AuthUser,
    file_prescription_id: &Uuid,
    review: DayReview,
) -> Result<FilePrescription, PrescriptionError> {
    let (day, prescription) = load_day(conn, file_prescription_id)?;
    authorization::can_write_prescription(actor, &prescription)?;
    if !day.uploaded {
        return Err(PrescriptionError::NothingToReview);
    }
    if review.status == HealthStatus::Unknown {
        return Err(PrescriptionError::InvalidField("status"));
    }
    let description = review
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    if description
        .as_ref()
        .is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_CHARS)
    {
        return Err(PrescriptionError::InvalidField("description"));
    }

    let now = Utc::now();
    let tx = conn.transaction()?;
    repository::record_day_review(&tx, &day.id, review.status, description.as_deref(), &now)?;
    let files = repository::mark_day_files_checked(&tx, &day.id)?;
    let checked = sync_checked(&tx, &prescription.id, &now)?;
    tx.commit()?;

    if review.status == HealthStatus::Emergency {
        tracing::warn!(
            file_prescription_id = %day.id,
            patient_id = %prescription.patient_id,
            "Day reviewed with emergency status"
        );
    }
    tracing::info!(
        file_prescription_id = %day.id,
        status = %review.status,
        files,
        prescription_checked = checked,
        "Day reviewed"
    );

    repository::get_file_prescription(conn, &day.id)?
        .ok_or(PrescriptionError::NotFound("file prescription"))
}
