use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{fmt_timestamp, parse_date, parse_timestamp, parse_uuid, WhereClause};
use crate::db::DatabaseError;
use crate::models::enums::Role;
use crate::models::*;

const USER_COLUMNS: &str = "u.id, u.email, u.password_hash, u.first_name, u.last_name, u.role,
     u.is_superuser, u.is_active, u.token_expires_at, u.created_at, u.updated_at";

struct UserRow {
    id: String,
    email: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    role: String,
    is_superuser: bool,
    is_active: bool,
    token_expires_at: Option<String>,
    created_at: String,
    updated_at: String,
}

fn user_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<UserRow, rusqlite::Error> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        role: row.get(5)?,
        is_superuser: row.get(6)?,
        is_active: row.get(7)?,
        token_expires_at: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn user_from_row(row: UserRow) -> Result<BaseUser, DatabaseError> {
    Ok(BaseUser {
        id: parse_uuid("users.id", &row.id)?,
        email: row.email,
        password_hash: row.password_hash,
        first_name: row.first_name,
        last_name: row.last_name,
        role: Role::from_str(&row.role)?,
        is_superuser: row.is_superuser,
        is_active: row.is_active,
        token_expires_at: row
            .token_expires_at
            .map(|ts| parse_timestamp("users.token_expires_at", &ts))
            .transpose()?,
        created_at: parse_timestamp("users.created_at", &row.created_at)?,
        updated_at: parse_timestamp("users.updated_at", &row.updated_at)?,
    })
}

// ═══════════════════════════════════════════
// Base users
// ═══════════════════════════════════════════

pub fn insert_user(conn: &Connection, user: &BaseUser) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO users (id, email, password_hash, first_name, last_name, role,
         is_superuser, is_active, token_expires_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            user.id.to_string(),
            user.email,
            user.password_hash,
            user.first_name,
            user.last_name,
            user.role.as_str(),
            user.is_superuser,
            user.is_active,
            user.token_expires_at.as_ref().map(fmt_timestamp),
            fmt_timestamp(&user.created_at),
            fmt_timestamp(&user.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &Uuid) -> Result<Option<BaseUser>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?1"),
            params![id.to_string()],
            user_row_from_rusqlite,
        )
        .optional()?;
    row.map(user_from_row).transpose()
}

/// Case-insensitive lookup (the column is `COLLATE NOCASE`).
pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<BaseUser>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.email = ?1"),
            params![email.trim()],
            user_row_from_rusqlite,
        )
        .optional()?;
    row.map(user_from_row).transpose()
}

pub fn update_user_names(
    conn: &Connection,
    id: &Uuid,
    first_name: &str,
    last_name: &str,
    now: &DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE users SET first_name = ?2, last_name = ?3, updated_at = ?4 WHERE id = ?1",
        params![id.to_string(), first_name, last_name, fmt_timestamp(now)],
    )?;
    ensure_changed(changed, "user", id)
}

pub fn update_password_hash(
    conn: &Connection,
    id: &Uuid,
    password_hash: &str,
    now: &DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE users SET password_hash = ?2, updated_at = ?3 WHERE id = ?1",
        params![id.to_string(), password_hash, fmt_timestamp(now)],
    )?;
    ensure_changed(changed, "user", id)
}

/// Mirror the latest token expiry onto the user row. `None` revokes
/// every outstanding token.
pub fn set_token_expiry(
    conn: &Connection,
    id: &Uuid,
    expires_at: Option<&DateTime<Utc>>,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE users SET token_expires_at = ?2 WHERE id = ?1",
        params![id.to_string(), expires_at.map(fmt_timestamp)],
    )?;
    ensure_changed(changed, "user", id)
}

pub fn set_user_active(
    conn: &Connection,
    id: &Uuid,
    active: bool,
    now: &DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE users SET is_active = ?2, updated_at = ?3 WHERE id = ?1",
        params![id.to_string(), active, fmt_timestamp(now)],
    )?;
    ensure_changed(changed, "user", id)
}

pub fn set_superuser(conn: &Connection, id: &Uuid, superuser: bool) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE users SET is_superuser = ?2 WHERE id = ?1",
        params![id.to_string(), superuser],
    )?;
    ensure_changed(changed, "user", id)
}

fn ensure_changed(changed: usize, entity: &str, id: &Uuid) -> Result<(), DatabaseError> {
    if changed == 0 {
        Err(DatabaseError::not_found(entity, id))
    } else {
        Ok(())
    }
}

// ═══════════════════════════════════════════
// Doctors
// ═══════════════════════════════════════════

pub fn insert_doctor(conn: &Connection, doctor: &Doctor) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO doctors (user_id, specialty, license_number, hospital)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            doctor.user_id.to_string(),
            doctor.specialty,
            doctor.license_number,
            doctor.hospital,
        ],
    )?;
    Ok(())
}

pub fn update_doctor(conn: &Connection, doctor: &Doctor) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE doctors SET specialty = ?2, license_number = ?3, hospital = ?4 WHERE user_id = ?1",
        params![
            doctor.user_id.to_string(),
            doctor.specialty,
            doctor.license_number,
            doctor.hospital,
        ],
    )?;
    ensure_changed(changed, "doctor", &doctor.user_id)
}

fn doctor_profile_from_rusqlite(
    row: &rusqlite::Row<'_>,
) -> Result<(UserRow, Option<String>, Option<String>, Option<String>), rusqlite::Error> {
    Ok((
        user_row_from_rusqlite(row)?,
        row.get(11)?,
        row.get(12)?,
        row.get(13)?,
    ))
}

fn doctor_profile_from_row(
    (user, specialty, license_number, hospital): (UserRow, Option<String>, Option<String>, Option<String>),
) -> Result<DoctorProfile, DatabaseError> {
    Ok(DoctorProfile {
        user: user_from_row(user)?,
        specialty,
        license_number,
        hospital,
    })
}

pub fn get_doctor_profile(conn: &Connection, id: &Uuid) -> Result<Option<DoctorProfile>, DatabaseError> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {USER_COLUMNS}, d.specialty, d.license_number, d.hospital
                 FROM doctors d JOIN users u ON u.id = d.user_id
                 WHERE d.user_id = ?1"
            ),
            params![id.to_string()],
            doctor_profile_from_rusqlite,
        )
        .optional()?;
    row.map(doctor_profile_from_row).transpose()
}

/// Active doctors, optionally narrowed to a specialty. Returns the page and
/// the total count.
pub fn list_doctor_profiles(
    conn: &Connection,
    specialty: Option<&str>,
    page: &Page,
) -> Result<(Vec<DoctorProfile>, u64), DatabaseError> {
    let mut clause = WhereClause::default();
    clause.push("u.is_active = {}", true);
    if let Some(specialty) = specialty {
        clause.push("d.specialty = {} COLLATE NOCASE", specialty.to_string());
    }
    let from = format!("FROM doctors d JOIN users u ON u.id = d.user_id{}", clause.sql());

    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) {from}"),
        clause.params().as_slice(),
        |row| row.get(0),
    )?;

    let slot = clause.next_slot();
    let (limit, offset) = (page.limit(), page.offset());
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS}, d.specialty, d.license_number, d.hospital {from}
         ORDER BY u.last_name, u.first_name LIMIT ?{slot} OFFSET ?{}",
        slot + 1
    ))?;
    let rows = stmt.query_map(
        clause.params_with(&[&limit, &offset]).as_slice(),
        doctor_profile_from_rusqlite,
    )?;

    let mut doctors = Vec::new();
    for row in rows {
        doctors.push(doctor_profile_from_row(row?)?);
    }
    Ok((doctors, count as u64))
}

// ═══════════════════════════════════════════
// Patients
// ═══════════════════════════════════════════

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (user_id, birth_date, phone) VALUES (?1, ?2, ?3)",
        params![
            patient.user_id.to_string(),
            patient.birth_date.map(|d| d.to_string()),
            patient.phone,
        ],
    )?;
    Ok(())
}

pub fn update_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE patients SET birth_date = ?2, phone = ?3 WHERE user_id = ?1",
        params![
            patient.user_id.to_string(),
            patient.birth_date.map(|d| d.to_string()),
            patient.phone,
        ],
    )?;
    ensure_changed(changed, "patient", &patient.user_id)
}

fn patient_profile_from_rusqlite(
    row: &rusqlite::Row<'_>,
) -> Result<(UserRow, Option<String>, Option<String>), rusqlite::Error> {
    Ok((user_row_from_rusqlite(row)?, row.get(11)?, row.get(12)?))
}

fn patient_profile_from_row(
    (user, birth_date, phone): (UserRow, Option<String>, Option<String>),
) -> Result<PatientProfile, DatabaseError> {
    Ok(PatientProfile {
        user: user_from_row(user)?,
        birth_date: birth_date
            .map(|d| parse_date("patients.birth_date", &d))
            .transpose()?,
        phone,
    })
}

pub fn get_patient_profile(conn: &Connection, id: &Uuid) -> Result<Option<PatientProfile>, DatabaseError> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {USER_COLUMNS}, p.birth_date, p.phone
                 FROM patients p JOIN users u ON u.id = p.user_id
                 WHERE p.user_id = ?1"
            ),
            params![id.to_string()],
            patient_profile_from_rusqlite,
        )
        .optional()?;
    row.map(patient_profile_from_row).transpose()
}

/// Active patients, optionally filtered by a name fragment.
pub fn list_patient_profiles(
    conn: &Connection,
    search: Option<&str>,
    page: &Page,
) -> Result<(Vec<PatientProfile>, u64), DatabaseError> {
    let mut clause = WhereClause::default();
    clause.push("u.is_active = {}", true);
    if let Some(search) = search.map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{search}%");
        let slot = clause.next_slot();
        clause.push(
            &format!(
                "(u.first_name LIKE {{}} COLLATE NOCASE OR u.last_name LIKE ?{slot} COLLATE NOCASE
                  OR u.email LIKE ?{slot} COLLATE NOCASE)"
            ),
            pattern,
        );
    }
    let from = format!("FROM patients p JOIN users u ON u.id = p.user_id{}", clause.sql());

    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) {from}"),
        clause.params().as_slice(),
        |row| row.get(0),
    )?;

    let slot = clause.next_slot();
    let (limit, offset) = (page.limit(), page.offset());
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS}, p.birth_date, p.phone {from}
         ORDER BY u.last_name, u.first_name LIMIT ?{slot} OFFSET ?{}",
        slot + 1
    ))?;
    let rows = stmt.query_map(
        clause.params_with(&[&limit, &offset]).as_slice(),
        patient_profile_from_rusqlite,
    )?;

    let mut patients = Vec::new();
    for row in rows {
        patients.push(patient_profile_from_row(row?)?);
    }
    Ok((patients, count as u64))
}
