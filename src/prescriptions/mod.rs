//! Prescriptions and their day-by-day upload schedule.
//!
//! Creation and range edits go through [`PrescriptionDirector`], which
//! drives a [`PrescriptionBuilder`] over one transaction. Uploads, reviews
//! and deletions keep the aggregate `prescription.checked` flag equal to
//! "no uploaded day is waiting for review".

pub mod builder;
pub mod review;
pub mod schedule;

pub use builder::*;
pub use review::*;
pub use schedule::*;

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::authorization::{self, AccessDenied, AuthUser};
use crate::db::repository;
use crate::db::DatabaseError;
use crate::models::{DataFile, FilePrescription, Prescription, ScheduleSummary};
use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum PrescriptionError {
    #[error("Start date {start} is after end date {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
    #[error("Schedule of {days} days exceeds the {max} day limit")]
    RangeTooLong { days: i64, max: i64 },
    #[error("Invalid {0}")]
    InvalidField(&'static str),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Day {0} already has uploads and cannot leave the schedule")]
    UploadedDayOutOfRange(NaiveDate),
    #[error("Cannot upload for {0}: the day has not started yet")]
    FutureDay(NaiveDate),
    #[error("Nothing to review: no file uploaded for this day")]
    NothingToReview,
    #[error(transparent)]
    AccessDenied(#[from] AccessDenied),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<rusqlite::Error> for PrescriptionError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.into())
    }
}

/// Raw upload received from a client.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Prescription with its schedule progress and attachments.
#[derive(Debug, Clone, Serialize)]
pub struct PrescriptionDetail {
    #[serde(flatten)]
    pub prescription: Prescription,
    pub summary: ScheduleSummary,
    pub schedule: Vec<FilePrescription>,
    pub files: Vec<DataFile>,
}

/// One scheduled day with its position and uploads.
#[derive(Debug, Clone, Serialize)]
pub struct DayDetail {
    #[serde(flatten)]
    pub day: FilePrescription,
    pub day_number: i64,
    pub files: Vec<DataFile>,
}

pub(crate) fn load_prescription(conn: &Connection, id: &Uuid) -> Result<Prescription, PrescriptionError> {
    repository::get_prescription(conn, id)?.ok_or(PrescriptionError::NotFound("prescription"))
}

pub(crate) fn load_day(
    conn: &Connection,
    id: &Uuid,
) -> Result<(FilePrescription, Prescription), PrescriptionError> {
    let day = repository::get_file_prescription(conn, id)?
        .ok_or(PrescriptionError::NotFound("file prescription"))?;
    let prescription = load_prescription(conn, &day.prescription_id)?;
    Ok((day, prescription))
}

/// Prescription detail, visible to its doctor, its patient and superusers.
pub fn get_detail(
    conn: &Connection,
    actor: &AuthUser,
    id: &Uuid,
) -> Result<PrescriptionDetail, PrescriptionError> {
    let prescription = load_prescription(conn, id)?;
    authorization::can_read_prescription(actor, &prescription)?;
    Ok(PrescriptionDetail {
        summary: repository::schedule_summary(conn, id)?,
        schedule: repository::get_schedule(conn, id)?,
        files: repository::get_prescription_files(conn, id)?,
        prescription,
    })
}

pub fn get_day_detail(
    conn: &Connection,
    actor: &AuthUser,
    id: &Uuid,
) -> Result<DayDetail, PrescriptionError> {
    let (day, prescription) = load_day(conn, id)?;
    authorization::can_read_prescription(actor, &prescription)?;
    Ok(DayDetail {
        day_number: day.day_number(prescription.start_date),
        files: repository::get_day_files(conn, id)?,
        day,
    })
}

/// A data file plus the prescription that owns it, after a read check.
pub fn get_data_file(
    conn: &Connection,
    actor: &AuthUser,
    id: &Uuid,
) -> Result<DataFile, PrescriptionError> {
    let file = repository::get_data_file(conn, id)?.ok_or(PrescriptionError::NotFound("data file"))?;
    let owner_id = repository::get_data_file_prescription_id(conn, id)?
        .ok_or(PrescriptionError::NotFound("prescription"))?;
    let owner = load_prescription(conn, &owner_id)?;
    authorization::can_read_data_file(actor, &owner)?;
    Ok(file)
}
