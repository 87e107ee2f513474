use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{fmt_timestamp, parse_timestamp, parse_uuid, WhereClause};
use crate::db::DatabaseError;
use crate::models::*;

const DATA_FILE_COLUMNS: &str = "df.id, df.uploader_id, df.prescription_id, df.file_prescription_id,
     df.original_name, df.stored_name, df.content_type, df.size_bytes, df.sha256, df.checked,
     df.created_at";

/// Resolves the owning prescription of any data file, whichever column
/// it hangs off.
const OWNING_PRESCRIPTION_JOIN: &str = "LEFT JOIN file_prescriptions f ON f.id = df.file_prescription_id
     JOIN prescriptions p ON p.id = COALESCE(df.prescription_id, f.prescription_id)";

struct DataFileRow {
    id: String,
    uploader_id: String,
    prescription_id: Option<String>,
    file_prescription_id: Option<String>,
    original_name: String,
    stored_name: String,
    content_type: String,
    size_bytes: i64,
    sha256: String,
    checked: bool,
    created_at: String,
}

fn data_file_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<DataFileRow, rusqlite::Error> {
    Ok(DataFileRow {
        id: row.get(0)?,
        uploader_id: row.get(1)?,
        prescription_id: row.get(2)?,
        file_prescription_id: row.get(3)?,
        original_name: row.get(4)?,
        stored_name: row.get(5)?,
        content_type: row.get(6)?,
        size_bytes: row.get(7)?,
        sha256: row.get(8)?,
        checked: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn data_file_from_row(row: DataFileRow) -> Result<DataFile, DatabaseError> {
    Ok(DataFile {
        id: parse_uuid("data_files.id", &row.id)?,
        uploader_id: parse_uuid("data_files.uploader_id", &row.uploader_id)?,
        prescription_id: row
            .prescription_id
            .map(|id| parse_uuid("data_files.prescription_id", &id))
            .transpose()?,
        file_prescription_id: row
            .file_prescription_id
            .map(|id| parse_uuid("data_files.file_prescription_id", &id))
            .transpose()?,
        original_name: row.original_name,
        stored_name: row.stored_name,
        content_type: row.content_type,
        size_bytes: row.size_bytes,
        sha256: row.sha256,
        checked: row.checked,
        created_at: parse_timestamp("data_files.created_at", &row.created_at)?,
    })
}

fn collect_data_files(
    stmt: &mut rusqlite::Statement<'_>,
    params: &[&dyn rusqlite::types::ToSql],
) -> Result<Vec<DataFile>, DatabaseError> {
    let rows = stmt.query_map(params, data_file_row_from_rusqlite)?;
    let mut files = Vec::new();
    for row in rows {
        files.push(data_file_from_row(row?)?);
    }
    Ok(files)
}

pub fn insert_data_file(conn: &Connection, file: &DataFile) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO data_files (id, uploader_id, prescription_id, file_prescription_id,
         original_name, stored_name, content_type, size_bytes, sha256, checked, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            file.id.to_string(),
            file.uploader_id.to_string(),
            file.prescription_id.map(|id| id.to_string()),
            file.file_prescription_id.map(|id| id.to_string()),
            file.original_name,
            file.stored_name,
            file.content_type,
            file.size_bytes,
            file.sha256,
            file.checked,
            fmt_timestamp(&file.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_data_file(conn: &Connection, id: &Uuid) -> Result<Option<DataFile>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {DATA_FILE_COLUMNS} FROM data_files df WHERE df.id = ?1"),
            params![id.to_string()],
            data_file_row_from_rusqlite,
        )
        .optional()?;
    row.map(data_file_from_row).transpose()
}

/// Prescription a data file ultimately belongs to.
pub fn get_data_file_prescription_id(conn: &Connection, id: &Uuid) -> Result<Option<Uuid>, DatabaseError> {
    let owner: Option<String> = conn
        .query_row(
            &format!("SELECT p.id FROM data_files df {OWNING_PRESCRIPTION_JOIN} WHERE df.id = ?1"),
            params![id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    owner.map(|id| parse_uuid("prescriptions.id", &id)).transpose()
}

pub fn delete_data_file(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    conn.execute("DELETE FROM data_files WHERE id = ?1", params![id.to_string()])?;
    Ok(())
}

/// Files attached directly to the prescription by its doctor.
pub fn get_prescription_files(conn: &Connection, prescription_id: &Uuid) -> Result<Vec<DataFile>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DATA_FILE_COLUMNS} FROM data_files df
         WHERE df.prescription_id = ?1 ORDER BY df.created_at"
    ))?;
    collect_data_files(&mut stmt, &[&prescription_id.to_string()])
}

/// Files uploaded against one scheduled day.
pub fn get_day_files(conn: &Connection, file_prescription_id: &Uuid) -> Result<Vec<DataFile>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DATA_FILE_COLUMNS} FROM data_files df
         WHERE df.file_prescription_id = ?1 ORDER BY df.created_at"
    ))?;
    collect_data_files(&mut stmt, &[&file_prescription_id.to_string()])
}

/// Every file of a prescription: doctor attachments and all day uploads.
pub fn get_all_prescription_files(conn: &Connection, prescription_id: &Uuid) -> Result<Vec<DataFile>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {DATA_FILE_COLUMNS} FROM data_files df {OWNING_PRESCRIPTION_JOIN}
         WHERE p.id = ?1 ORDER BY df.created_at"
    ))?;
    collect_data_files(&mut stmt, &[&prescription_id.to_string()])
}

pub fn count_day_files(conn: &Connection, file_prescription_id: &Uuid) -> Result<u32, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM data_files WHERE file_prescription_id = ?1",
        params![file_prescription_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn mark_day_files_checked(conn: &Connection, file_prescription_id: &Uuid) -> Result<usize, DatabaseError> {
    let changed = conn.execute(
        "UPDATE data_files SET checked = 1 WHERE file_prescription_id = ?1",
        params![file_prescription_id.to_string()],
    )?;
    Ok(changed)
}

/// Scoped listing, newest first.
pub fn list_data_files(
    conn: &Connection,
    scope: &Scope,
    filter: &DataFileFilter,
    page: &Page,
) -> Result<(Vec<DataFile>, u64), DatabaseError> {
    let mut clause = WhereClause::default();
    match scope {
        Scope::All => {}
        Scope::Doctor(id) => clause.push("p.doctor_id = {}", id.to_string()),
        Scope::Patient(id) => clause.push("p.patient_id = {}", id.to_string()),
    }
    if let Some(prescription_id) = filter.prescription_id {
        clause.push("p.id = {}", prescription_id.to_string());
    }
    if let Some(file_prescription_id) = filter.file_prescription_id {
        clause.push("df.file_prescription_id = {}", file_prescription_id.to_string());
    }
    if let Some(uploader_id) = filter.uploader_id {
        clause.push("df.uploader_id = {}", uploader_id.to_string());
    }
    let from = format!("FROM data_files df {OWNING_PRESCRIPTION_JOIN}{}", clause.sql());

    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) {from}"),
        clause.params().as_slice(),
        |row| row.get(0),
    )?;

    let slot = clause.next_slot();
    let (limit, offset) = (page.limit(), page.offset());
    let mut stmt = conn.prepare(&format!(
        "SELECT {DATA_FILE_COLUMNS} {from}
         ORDER BY df.created_at DESC, df.id LIMIT ?{slot} OFFSET ?{}",
        slot + 1
    ))?;
    let files = collect_data_files(&mut stmt, &clause.params_with(&[&limit, &offset]))?;
    Ok((files, count as u64))
}

/// Build a data file row for freshly stored bytes.
pub fn new_data_file(
    uploader_id: Uuid,
    owner: DataFileOwner,
    original_name: &str,
    stored: &crate::storage::StoredFile,
    now: DateTime<Utc>,
) -> DataFile {
    let (prescription_id, file_prescription_id) = match owner {
        DataFileOwner::Prescription(id) => (Some(id), None),
        DataFileOwner::FilePrescription(id) => (None, Some(id)),
    };
    DataFile {
        id: Uuid::new_v4(),
        uploader_id,
        prescription_id,
        file_prescription_id,
        original_name: original_name.to_string(),
        stored_name: stored.stored_name.clone(),
        content_type: stored.content_type.clone(),
        size_bytes: stored.size_bytes as i64,
        sha256: stored.sha256.clone(),
        checked: false,
        created_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures;
    use super::super::{insert_file_prescriptions, mark_day_uploaded};
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::storage::StoredFile;

    fn stored(name: &str) -> StoredFile {
        StoredFile {
            stored_name: format!("x/{}_{name}", Uuid::new_v4()),
            content_type: "image/png".into(),
            size_bytes: 4,
            sha256: "00".repeat(32),
        }
    }

    #[test]
    fn doctor_and_patient_files_resolve_to_prescription() {
        let conn = open_memory_database().unwrap();
        let doc = fixtures::doctor(&conn, "d@clinic.org");
        let pat = fixtures::patient(&conn, "p@home.net");
        let p = fixtures::prescription(&conn, &doc, &pat, "2024-03-01", "2024-03-02");
        let day = FilePrescription::new(p.id, p.start_date, Utc::now());
        insert_file_prescriptions(&conn, &[day.clone()]).unwrap();
        mark_day_uploaded(&conn, &day.id, &Utc::now()).unwrap();

        let attached = new_data_file(doc.id, DataFileOwner::Prescription(p.id), "plan.pdf", &stored("plan.pdf"), Utc::now());
        let uploaded = new_data_file(pat.id, DataFileOwner::FilePrescription(day.id), "bp.png", &stored("bp.png"), Utc::now());
        insert_data_file(&conn, &attached).unwrap();
        insert_data_file(&conn, &uploaded).unwrap();

        assert_eq!(get_data_file_prescription_id(&conn, &attached.id).unwrap(), Some(p.id));
        assert_eq!(get_data_file_prescription_id(&conn, &uploaded.id).unwrap(), Some(p.id));
        assert_eq!(get_prescription_files(&conn, &p.id).unwrap().len(), 1);
        assert_eq!(get_day_files(&conn, &day.id).unwrap().len(), 1);
        assert_eq!(get_all_prescription_files(&conn, &p.id).unwrap().len(), 2);
        assert_eq!(count_day_files(&conn, &day.id).unwrap(), 1);

        let (listed, total) =
            list_data_files(&conn, &Scope::Patient(pat.id), &DataFileFilter::default(), &Page::default()).unwrap();
        assert_eq!(total, 2);
        assert_eq!(listed.len(), 2);

        assert_eq!(mark_day_files_checked(&conn, &day.id).unwrap(), 1);
        assert!(get_data_file(&conn, &uploaded.id).unwrap().unwrap().checked);
    }

    #[test]
    fn file_must_hang_off_exactly_one_owner() {
        let conn = open_memory_database().unwrap();
        let doc = fixtures::doctor(&conn, "d@clinic.org");
        let mut orphan = new_data_file(
            doc.id,
            DataFileOwner::Prescription(Uuid::new_v4()),
            "x.txt",
            &stored("x.txt"),
            Utc::now(),
        );
        orphan.prescription_id = None;
        let err = insert_data_file(&conn, &orphan).unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
    }

    #[test]
    fn deleting_prescription_cascades_to_files() {
        let conn = open_memory_database().unwrap();
        let doc = fixtures::doctor(&conn, "d@clinic.org");
        let pat = fixtures::patient(&conn, "p@home.net");
        let p = fixtures::prescription(&conn, &doc, &pat, "2024-03-01", "2024-03-01");
        let file = new_data_file(doc.id, DataFileOwner::Prescription(p.id), "a.txt", &stored("a.txt"), Utc::now());
        insert_data_file(&conn, &file).unwrap();

        super::super::delete_prescription(&conn, &p.id).unwrap();
        assert!(get_data_file(&conn, &file.id).unwrap().is_none());
    }
}
