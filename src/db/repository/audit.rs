use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection};

use super::fmt_timestamp;
use crate::db::DatabaseError;

/// One row of the access audit trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    pub timestamp: String,
    pub user_id: Option<String>,
    pub action: String,
    pub entity: String,
}

/// Insert a batch of audit entries into the audit_log table.
pub fn insert_audit_entries(conn: &Connection, entries: &[AuditRecord]) -> Result<(), DatabaseError> {
    let mut stmt = conn.prepare(
        "INSERT INTO audit_log (timestamp, user_id, action, entity) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for entry in entries {
        stmt.execute(params![entry.timestamp, entry.user_id, entry.action, entry.entity])?;
    }
    Ok(())
}

/// Prune audit entries older than `retention_days` before `now`.
pub fn prune_audit_log(
    conn: &Connection,
    retention_days: i64,
    now: &DateTime<Utc>,
) -> Result<usize, DatabaseError> {
    let cutoff = fmt_timestamp(&(*now - Duration::days(retention_days)));
    let deleted = conn.execute("DELETE FROM audit_log WHERE timestamp < ?1", params![cutoff])?;
    Ok(deleted)
}

/// Entries recorded for one user, newest first.
pub fn query_audit_by_user(
    conn: &Connection,
    user_id: &str,
    limit: u32,
) -> Result<Vec<AuditRecord>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT timestamp, user_id, action, entity FROM audit_log
         WHERE user_id = ?1 ORDER BY timestamp DESC, id DESC LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(params![user_id, limit], |row| {
            Ok(AuditRecord {
                timestamp: row.get(0)?,
                user_id: row.get(1)?,
                action: row.get(2)?,
                entity: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
