//! Prescription creation and update pipeline.
//!
//! `PrescriptionDirector` decides which builder steps run for an operation;
//! `PrescriptionBuilder` performs them against one open transaction:
//!
//! 1. `build_prescription` inserts or updates the prescription row
//! 2. `build_file_prescriptions` brings the schedule in line with the range
//! 3. `build_data_files` attaches stored files
//! 4. `refresh_checked` recomputes the aggregate flag
//!
//! Nothing is visible to other connections until the director commits.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Deserialize;
use uuid::Uuid;

use super::schedule::expand_days;
use super::{load_day, load_prescription, PrescriptionError, Upload};
use crate::authorization::{self, AccessDenied, AuthUser};
use crate::db::repository;
use crate::models::{DataFile, DataFileOwner, FilePrescription, Prescription};
use crate::storage::{sanitize_filename, MediaStore};

#[derive(Debug, Clone, Deserialize)]
pub struct NewPrescription {
    pub patient_id: Uuid,
    /// Only superusers may name a doctor; doctors always write as themselves.
    #[serde(default)]
    pub doctor_id: Option<Uuid>,
    pub text: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePrescription {
    pub text: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Recompute `prescription.checked` from its schedule. Returns the new value.
pub fn sync_checked(
    conn: &Connection,
    prescription_id: &Uuid,
    now: &DateTime<Utc>,
) -> Result<bool, PrescriptionError> {
    let checked = !repository::has_unchecked_uploads(conn, prescription_id)?;
    repository::set_prescription_checked(conn, prescription_id, checked, now)?;
    Ok(checked)
}

fn clean_text(text: &str) -> Result<String, PrescriptionError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(PrescriptionError::InvalidField("text"));
    }
    Ok(text.to_string())
}

// ═══════════════════════════════════════════════════════════
// Builder
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Create,
    Update,
}

pub struct PrescriptionBuilder<'t> {
    /// Open transaction; `Transaction` derefs to `Connection`.
    tx: &'t Connection,
    mode: Mode,
    now: DateTime<Utc>,
    prescription: Prescription,
    days_added: usize,
    days_removed: usize,
}

impl<'t> PrescriptionBuilder<'t> {
    pub fn for_create(tx: &'t Connection, prescription: Prescription, now: DateTime<Utc>) -> Self {
        Self {
            tx,
            mode: Mode::Create,
            now,
            prescription,
            days_added: 0,
            days_removed: 0,
        }
    }

    pub fn for_update(tx: &'t Connection, prescription: Prescription, now: DateTime<Utc>) -> Self {
        Self {
            mode: Mode::Update,
            ..Self::for_create(tx, prescription, now)
        }
    }

    pub fn build_prescription(&mut self) -> Result<&mut Self, PrescriptionError> {
        self.prescription.updated_at = self.now;
        match self.mode {
            Mode::Create => repository::insert_prescription(self.tx, &self.prescription)?,
            Mode::Update => repository::update_prescription(self.tx, &self.prescription)?,
        }
        Ok(self)
    }

    /// Create missing days and drop days outside the range. Dropping a day
    /// that already has uploads fails the whole operation.
    pub fn build_file_prescriptions(&mut self) -> Result<&mut Self, PrescriptionError> {
        let wanted = expand_days(self.prescription.start_date, self.prescription.end_date)?;
        let existing = match self.mode {
            Mode::Create => Vec::new(),
            Mode::Update => repository::get_schedule(self.tx, &self.prescription.id)?,
        };

        let mut stale = Vec::new();
        for day in &existing {
            if !self.prescription.covers(day.day) {
                if day.uploaded {
                    return Err(PrescriptionError::UploadedDayOutOfRange(day.day));
                }
                stale.push(day.id);
            }
        }

        let present: HashSet<NaiveDate> = existing.iter().map(|d| d.day).collect();
        let fresh: Vec<FilePrescription> = wanted
            .into_iter()
            .filter(|day| !present.contains(day))
            .map(|day| FilePrescription::new(self.prescription.id, day, self.now))
            .collect();

        repository::delete_file_prescriptions(self.tx, &stale)?;
        repository::insert_file_prescriptions(self.tx, &fresh)?;
        self.days_removed += stale.len();
        self.days_added += fresh.len();
        Ok(self)
    }

    pub fn build_data_files(&mut self, files: &[DataFile]) -> Result<&mut Self, PrescriptionError> {
        for file in files {
            repository::insert_data_file(self.tx, file)?;
        }
        Ok(self)
    }

    pub fn refresh_checked(&mut self) -> Result<&mut Self, PrescriptionError> {
        self.prescription.checked = sync_checked(self.tx, &self.prescription.id, &self.now)?;
        Ok(self)
    }

    pub fn finish(self) -> Prescription {
        tracing::debug!(
            prescription_id = %self.prescription.id,
            added = self.days_added,
            removed = self.days_removed,
            "Schedule built"
        );
        self.prescription
    }
}

// ═══════════════════════════════════════════════════════════
// Director
// ═══════════════════════════════════════════════════════════

pub struct PrescriptionDirector;

impl PrescriptionDirector {
    /// Write a prescription and its full schedule atomically.
    pub fn create(
        conn: &mut Connection,
        actor: &AuthUser,
        req: NewPrescription,
    ) -> Result<Prescription, PrescriptionError> {
        let doctor_id = Self::resolve_doctor(conn, actor, req.doctor_id)?;
        let text = clean_text(&req.text)?;
        expand_days(req.start_date, req.end_date)?;

        let patient = repository::get_patient_profile(conn, &req.patient_id)?
            .filter(|p| p.user.is_active)
            .ok_or(PrescriptionError::NotFound("patient"))?;

        let now = Utc::now();
        let prescription = Prescription {
            id: Uuid::new_v4(),
            doctor_id,
            patient_id: patient.user.id,
            text,
            start_date: req.start_date,
            end_date: req.end_date,
            checked: true,
            created_at: now,
            updated_at: now,
        };

        let tx = conn.transaction()?;
        let mut builder = PrescriptionBuilder::for_create(&tx, prescription, now);
        builder
            .build_prescription()?
            .build_file_prescriptions()?
            .refresh_checked()?;
        let prescription = builder.finish();
        tx.commit()?;

        tracing::info!(
            prescription_id = %prescription.id,
            doctor_id = %prescription.doctor_id,
            patient_id = %prescription.patient_id,
            "Prescription created"
        );
        Ok(prescription)
    }

    /// Edit text and/or range. A range change re-syncs the schedule.
    pub fn update(
        conn: &mut Connection,
        actor: &AuthUser,
        id: &Uuid,
        req: UpdatePrescription,
    ) -> Result<Prescription, PrescriptionError> {
        let mut prescription = load_prescription(conn, id)?;
        authorization::can_write_prescription(actor, &prescription)?;

        if let Some(text) = &req.text {
            prescription.text = clean_text(text)?;
        }
        let start = req.start_date.unwrap_or(prescription.start_date);
        let end = req.end_date.unwrap_or(prescription.end_date);
        let range_changed = start != prescription.start_date || end != prescription.end_date;
        if range_changed {
            expand_days(start, end)?;
            prescription.start_date = start;
            prescription.end_date = end;
        }

        let tx = conn.transaction()?;
        let mut builder = PrescriptionBuilder::for_update(&tx, prescription, Utc::now());
        builder.build_prescription()?;
        if range_changed {
            builder.build_file_prescriptions()?.refresh_checked()?;
        }
        let prescription = builder.finish();
        tx.commit()?;

        tracing::info!(prescription_id = %prescription.id, range_changed, "Prescription updated");
        Ok(prescription)
    }

    fn resolve_doctor(
        conn: &Connection,
        actor: &AuthUser,
        requested: Option<Uuid>,
    ) -> Result<Uuid, PrescriptionError> {
        let doctor_id = match requested {
            Some(id) if actor.is_superuser => id,
            None if actor.is_superuser => {
                return Err(PrescriptionError::InvalidField("doctor_id"));
            }
            Some(id) if id != actor.id => {
                return Err(AccessDenied("doctors can only write their own prescriptions".into()).into());
            }
            _ if actor.is_doctor() => actor.id,
            _ => return Err(AccessDenied("requires doctor".into()).into()),
        };
        repository::get_doctor_profile(conn, &doctor_id)?
            .filter(|d| d.user.is_active)
            .ok_or(PrescriptionError::NotFound("doctor"))?;
        Ok(doctor_id)
    }
}

// ═══════════════════════════════════════════════════════════
// Deletion and file attachments
// ═══════════════════════════════════════════════════════════

/// Remove a prescription with its schedule, data file rows and stored files.
pub fn delete(
    conn: &mut Connection,
    store: &MediaStore,
    actor: &AuthUser,
    id: &Uuid,
) -> Result<(), PrescriptionError> {
    let prescription = load_prescription(conn, id)?;
    authorization::can_write_prescription(actor, &prescription)?;

    // Immediate: no upload may land between listing files and deleting rows.
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let files = repository::get_all_prescription_files(&tx, id)?;
    repository::delete_prescription(&tx, id)?;
    tx.commit()?;

    store.delete_all(files.iter().map(|f| f.stored_name.as_str()));
    tracing::info!(prescription_id = %id, files = files.len(), "Prescription deleted");
    Ok(())
}

/// Store bytes, then insert the row with `write`. The stored file is
/// removed again if the database write fails.
fn store_then_record(
    conn: &mut Connection,
    store: &MediaStore,
    actor: &AuthUser,
    owner: DataFileOwner,
    upload: &Upload,
    write: impl FnOnce(&Transaction<'_>, &DataFile, &DateTime<Utc>) -> Result<(), PrescriptionError>,
) -> Result<DataFile, PrescriptionError> {
    let stored = store.save(&actor.id, &upload.file_name, &upload.bytes)?;
    let now = Utc::now();
    let file = repository::new_data_file(
        actor.id,
        owner,
        &sanitize_filename(&upload.file_name),
        &stored,
        now,
    );

    let result = conn
        .transaction()
        .map_err(PrescriptionError::from)
        .and_then(|tx| {
            write(&tx, &file, &now)?;
            tx.commit()?;
            Ok(())
        });
    if let Err(e) = result {
        store.delete_all([stored.stored_name.as_str()]);
        return Err(e);
    }
    Ok(file)
}

/// The writing doctor attaches a file to the prescription itself.
pub fn attach_doctor_file(
    conn: &mut Connection,
    store: &MediaStore,
    actor: &AuthUser,
    prescription_id: &Uuid,
    upload: Upload,
) -> Result<DataFile, PrescriptionError> {
    let prescription = load_prescription(conn, prescription_id)?;
    authorization::can_write_prescription(actor, &prescription)?;

    let file = store_then_record(
        conn,
        store,
        actor,
        DataFileOwner::Prescription(prescription.id),
        &upload,
        |tx, file, now| {
            let mut builder = PrescriptionBuilder::for_update(tx, prescription.clone(), *now);
            builder.build_data_files(std::slice::from_ref(file))?;
            Ok(())
        },
    )?;
    tracing::info!(prescription_id = %prescription_id, data_file_id = %file.id, "Doctor file attached");
    Ok(file)
}

/// The patient uploads a file for one scheduled day on or before `today`.
pub fn upload_patient_file(
    conn: &mut Connection,
    store: &MediaStore,
    actor: &AuthUser,
    file_prescription_id: &Uuid,
    upload: Upload,
    today: NaiveDate,
) -> Result<DataFile, PrescriptionError> {
    let (day, prescription) = load_day(conn, file_prescription_id)?;
    authorization::can_upload_for_day(actor, &prescription)?;
    if day.day > today {
        return Err(PrescriptionError::FutureDay(day.day));
    }

    let file = store_then_record(
        conn,
        store,
        actor,
        DataFileOwner::FilePrescription(day.id),
        &upload,
        |tx, file, now| {
            repository::insert_data_file(tx, file)?;
            repository::mark_day_uploaded(tx, &day.id, now)?;
            sync_checked(tx, &prescription.id, now)?;
            Ok(())
        },
    )?;
    tracing::info!(
        file_prescription_id = %file_prescription_id,
        data_file_id = %file.id,
        "Patient file uploaded"
    );
    Ok(file)
}

/// Remove one data file. A day left without files reverts to not uploaded.
pub fn delete_data_file(
    conn: &mut Connection,
    store: &MediaStore,
    actor: &AuthUser,
    id: &Uuid,
) -> Result<(), PrescriptionError> {
    let file = repository::get_data_file(conn, id)?.ok_or(PrescriptionError::NotFound("data file"))?;
    authorization::can_delete_data_file(actor, &file)?;
    let owner_id = repository::get_data_file_prescription_id(conn, id)?
        .ok_or(PrescriptionError::NotFound("prescription"))?;

    let now = Utc::now();
    let tx = conn.transaction()?;
    repository::delete_data_file(&tx, id)?;
    if let Some(day_id) = file.file_prescription_id {
        if repository::count_day_files(&tx, &day_id)? == 0 {
            repository::reset_day(&tx, &day_id, &now)?;
        }
    }
    sync_checked(&tx, &owner_id, &now)?;
    tx.commit()?;

    store.delete_all([file.stored_name.as_str()]);
    tracing::info!(data_file_id = %id, "Data file deleted");
    Ok(())
}
