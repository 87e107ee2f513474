use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{fmt_timestamp, parse_date, parse_timestamp, parse_uuid, WhereClause};
use crate::db::DatabaseError;
use crate::models::*;

const PRESCRIPTION_COLUMNS: &str = "p.id, p.doctor_id, p.patient_id, p.text, p.start_date,
     p.end_date, p.checked, p.created_at, p.updated_at";

struct PrescriptionRow {
    id: String,
    doctor_id: String,
    patient_id: String,
    text: String,
    start_date: String,
    end_date: String,
    checked: bool,
    created_at: String,
    updated_at: String,
}

fn prescription_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<PrescriptionRow, rusqlite::Error> {
    Ok(PrescriptionRow {
        id: row.get(0)?,
        doctor_id: row.get(1)?,
        patient_id: row.get(2)?,
        text: row.get(3)?,
        start_date: row.get(4)?,
        end_date: row.get(5)?,
        checked: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn prescription_from_row(row: PrescriptionRow) -> Result<Prescription, DatabaseError> {
    Ok(Prescription {
        id: parse_uuid("prescriptions.id", &row.id)?,
        doctor_id: parse_uuid("prescriptions.doctor_id", &row.doctor_id)?,
        patient_id: parse_uuid("prescriptions.patient_id", &row.patient_id)?,
        text: row.text,
        start_date: parse_date("prescriptions.start_date", &row.start_date)?,
        end_date: parse_date("prescriptions.end_date", &row.end_date)?,
        checked: row.checked,
        created_at: parse_timestamp("prescriptions.created_at", &row.created_at)?,
        updated_at: parse_timestamp("prescriptions.updated_at", &row.updated_at)?,
    })
}

pub fn insert_prescription(conn: &Connection, p: &Prescription) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO prescriptions (id, doctor_id, patient_id, text, start_date, end_date,
         checked, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            p.id.to_string(),
            p.doctor_id.to_string(),
            p.patient_id.to_string(),
            p.text,
            p.start_date.to_string(),
            p.end_date.to_string(),
            p.checked,
            fmt_timestamp(&p.created_at),
            fmt_timestamp(&p.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_prescription(conn: &Connection, id: &Uuid) -> Result<Option<Prescription>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {PRESCRIPTION_COLUMNS} FROM prescriptions p WHERE p.id = ?1"),
            params![id.to_string()],
            prescription_row_from_rusqlite,
        )
        .optional()?;
    row.map(prescription_from_row).transpose()
}

/// Persist text, range and `updated_at` of an existing prescription.
pub fn update_prescription(conn: &Connection, p: &Prescription) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE prescriptions SET text = ?2, start_date = ?3, end_date = ?4, updated_at = ?5
         WHERE id = ?1",
        params![
            p.id.to_string(),
            p.text,
            p.start_date.to_string(),
            p.end_date.to_string(),
            fmt_timestamp(&p.updated_at),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("prescription", p.id));
    }
    Ok(())
}

pub fn set_prescription_checked(
    conn: &Connection,
    id: &Uuid,
    checked: bool,
    now: &DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE prescriptions SET checked = ?2, updated_at = ?3 WHERE id = ?1",
        params![id.to_string(), checked, fmt_timestamp(now)],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("prescription", id));
    }
    Ok(())
}

/// Deletes the prescription; schedule rows and data file rows cascade.
pub fn delete_prescription(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    conn.execute("DELETE FROM prescriptions WHERE id = ?1", params![id.to_string()])?;
    Ok(())
}

fn scoped_clause(scope: &Scope, filter: &PrescriptionFilter) -> WhereClause {
    let mut clause = WhereClause::default();
    match scope {
        Scope::All => {}
        Scope::Doctor(id) => clause.push("p.doctor_id = {}", id.to_string()),
        Scope::Patient(id) => clause.push("p.patient_id = {}", id.to_string()),
    }
    if let Some(doctor_id) = filter.doctor_id {
        clause.push("p.doctor_id = {}", doctor_id.to_string());
    }
    if let Some(patient_id) = filter.patient_id {
        clause.push("p.patient_id = {}", patient_id.to_string());
    }
    if let Some(checked) = filter.checked {
        clause.push("p.checked = {}", checked);
    }
    clause
}

/// Newest first. Returns the page and the total matching count.
pub fn list_prescriptions(
    conn: &Connection,
    scope: &Scope,
    filter: &PrescriptionFilter,
    page: &Page,
) -> Result<(Vec<Prescription>, u64), DatabaseError> {
    let clause = scoped_clause(scope, filter);
    let from = format!("FROM prescriptions p{}", clause.sql());

    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) {from}"),
        clause.params().as_slice(),
        |row| row.get(0),
    )?;

    let slot = clause.next_slot();
    let (limit, offset) = (page.limit(), page.offset());
    let mut stmt = conn.prepare(&format!(
        "SELECT {PRESCRIPTION_COLUMNS} {from}
         ORDER BY p.created_at DESC, p.id LIMIT ?{slot} OFFSET ?{}",
        slot + 1
    ))?;
    let rows = stmt.query_map(
        clause.params_with(&[&limit, &offset]).as_slice(),
        prescription_row_from_rusqlite,
    )?;

    let mut prescriptions = Vec::new();
    for row in rows {
        prescriptions.push(prescription_from_row(row?)?);
    }
    Ok((prescriptions, count as u64))
}
