use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{fmt_timestamp, parse_date, parse_timestamp, parse_uuid, WhereClause};
use crate::db::DatabaseError;
use crate::models::enums::HealthStatus;
use crate::models::*;

const FILE_PRESCRIPTION_COLUMNS: &str = "f.id, f.prescription_id, f.day, f.uploaded, f.checked,
     f.status, f.description, f.created_at, f.updated_at";

struct FilePrescriptionRow {
    id: String,
    prescription_id: String,
    day: String,
    uploaded: bool,
    checked: bool,
    status: String,
    description: Option<String>,
    created_at: String,
    updated_at: String,
}

fn file_prescription_row_from_rusqlite(
    row: &rusqlite::Row<'_>,
) -> Result<FilePrescriptionRow, rusqlite::Error> {
    Ok(FilePrescriptionRow {
        id: row.get(0)?,
        prescription_id: row.get(1)?,
        day: row.get(2)?,
        uploaded: row.get(3)?,
        checked: row.get(4)?,
        status: row.get(5)?,
        description: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn file_prescription_from_row(row: FilePrescriptionRow) -> Result<FilePrescription, DatabaseError> {
    Ok(FilePrescription {
        id: parse_uuid("file_prescriptions.id", &row.id)?,
        prescription_id: parse_uuid("file_prescriptions.prescription_id", &row.prescription_id)?,
        day: parse_date("file_prescriptions.day", &row.day)?,
        uploaded: row.uploaded,
        checked: row.checked,
        status: HealthStatus::from_str(&row.status)?,
        description: row.description,
        created_at: parse_timestamp("file_prescriptions.created_at", &row.created_at)?,
        updated_at: parse_timestamp("file_prescriptions.updated_at", &row.updated_at)?,
    })
}

/// Bulk insert with one prepared statement.
pub fn insert_file_prescriptions(
    conn: &Connection,
    rows: &[FilePrescription],
) -> Result<(), DatabaseError> {
    let mut stmt = conn.prepare(
        "INSERT INTO file_prescriptions (id, prescription_id, day, uploaded, checked, status,
         description, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?;
    for fp in rows {
        stmt.execute(params![
            fp.id.to_string(),
            fp.prescription_id.to_string(),
            fp.day.to_string(),
            fp.uploaded,
            fp.checked,
            fp.status.as_str(),
            fp.description,
            fmt_timestamp(&fp.created_at),
            fmt_timestamp(&fp.updated_at),
        ])?;
    }
    Ok(())
}

pub fn get_file_prescription(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<FilePrescription>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {FILE_PRESCRIPTION_COLUMNS} FROM file_prescriptions f WHERE f.id = ?1"),
            params![id.to_string()],
            file_prescription_row_from_rusqlite,
        )
        .optional()?;
    row.map(file_prescription_from_row).transpose()
}

/// The whole schedule of one prescription, ordered by day.
pub fn get_schedule(
    conn: &Connection,
    prescription_id: &Uuid,
) -> Result<Vec<FilePrescription>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {FILE_PRESCRIPTION_COLUMNS} FROM file_prescriptions f
         WHERE f.prescription_id = ?1 ORDER BY f.day"
    ))?;
    let rows = stmt.query_map(params![prescription_id.to_string()], file_prescription_row_from_rusqlite)?;

    let mut schedule = Vec::new();
    for row in rows {
        schedule.push(file_prescription_from_row(row?)?);
    }
    Ok(schedule)
}

pub fn delete_file_prescriptions(conn: &Connection, ids: &[Uuid]) -> Result<(), DatabaseError> {
    let mut stmt = conn.prepare("DELETE FROM file_prescriptions WHERE id = ?1")?;
    for id in ids {
        stmt.execute(params![id.to_string()])?;
    }
    Ok(())
}

/// A patient uploaded a file for this day: the day needs (re-)review.
pub fn mark_day_uploaded(conn: &Connection, id: &Uuid, now: &DateTime<Utc>) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE file_prescriptions SET uploaded = 1, checked = 0, updated_at = ?2 WHERE id = ?1",
        params![id.to_string(), fmt_timestamp(now)],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("file_prescription", id));
    }
    Ok(())
}

/// The last file of this day was removed: back to an untouched day.
pub fn reset_day(conn: &Connection, id: &Uuid, now: &DateTime<Utc>) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE file_prescriptions
         SET uploaded = 0, checked = 0, status = 'unknown', description = NULL, updated_at = ?2
         WHERE id = ?1",
        params![id.to_string(), fmt_timestamp(now)],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("file_prescription", id));
    }
    Ok(())
}

/// Record a doctor's review of an uploaded day.
pub fn record_day_review(
    conn: &Connection,
    id: &Uuid,
    status: HealthStatus,
    description: Option<&str>,
    now: &DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE file_prescriptions SET checked = 1, status = ?2, description = ?3, updated_at = ?4
         WHERE id = ?1",
        params![id.to_string(), status.as_str(), description, fmt_timestamp(now)],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("file_prescription", id));
    }
    Ok(())
}

/// True when some uploaded day of the prescription still awaits review.
pub fn has_unchecked_uploads(conn: &Connection, prescription_id: &Uuid) -> Result<bool, DatabaseError> {
    let pending: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM file_prescriptions
                       WHERE prescription_id = ?1 AND uploaded = 1 AND checked = 0)",
        params![prescription_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(pending)
}

pub fn schedule_summary(conn: &Connection, prescription_id: &Uuid) -> Result<ScheduleSummary, DatabaseError> {
    let summary = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(uploaded), 0), COALESCE(SUM(checked), 0)
         FROM file_prescriptions WHERE prescription_id = ?1",
        params![prescription_id.to_string()],
        |row| {
            Ok(ScheduleSummary {
                days_total: row.get(0)?,
                days_uploaded: row.get(1)?,
                days_checked: row.get(2)?,
            })
        },
    )?;
    Ok(summary)
}

/// Scoped listing across prescriptions, ordered by prescription then day.
pub fn list_file_prescriptions(
    conn: &Connection,
    scope: &Scope,
    filter: &FilePrescriptionFilter,
    page: &Page,
) -> Result<(Vec<FilePrescription>, u64), DatabaseError> {
    let mut clause = WhereClause::default();
    match scope {
        Scope::All => {}
        Scope::Doctor(id) => clause.push("p.doctor_id = {}", id.to_string()),
        Scope::Patient(id) => clause.push("p.patient_id = {}", id.to_string()),
    }
    if let Some(prescription_id) = filter.prescription_id {
        clause.push("f.prescription_id = {}", prescription_id.to_string());
    }
    if let Some(uploaded) = filter.uploaded {
        clause.push("f.uploaded = {}", uploaded);
    }
    if let Some(checked) = filter.checked {
        clause.push("f.checked = {}", checked);
    }
    if let Some(status) = filter.status {
        clause.push("f.status = {}", status.as_str());
    }
    let from = format!(
        "FROM file_prescriptions f JOIN prescriptions p ON p.id = f.prescription_id{}",
        clause.sql()
    );

    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) {from}"),
        clause.params().as_slice(),
        |row| row.get(0),
    )?;

    let slot = clause.next_slot();
    let (limit, offset) = (page.limit(), page.offset());
    let mut stmt = conn.prepare(&format!(
        "SELECT {FILE_PRESCRIPTION_COLUMNS} {from}
         ORDER BY p.created_at DESC, f.prescription_id, f.day LIMIT ?{slot} OFFSET ?{}",
        slot + 1
    ))?;
    let rows = stmt.query_map(
        clause.params_with(&[&limit, &offset]).as_slice(),
        file_prescription_row_from_rusqlite,
    )?;

    let mut days = Vec::new();
    for row in rows {
        days.push(file_prescription_from_row(row?)?);
    }
    Ok((days, count as u64))
}
