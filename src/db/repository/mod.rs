//! Repository layer: entity-scoped database operations.
//!
//! Every function takes a borrowed `Connection` so callers decide whether
//! it runs inside a transaction (`Transaction` derefs to `Connection`).

mod audit;
mod data_file;
mod file_prescription;
mod prescription;
mod user;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::ToSql;
use uuid::Uuid;

use super::DatabaseError;

pub use audit::*;
pub use data_file::*;
pub use file_prescription::*;
pub use prescription::*;
pub use user::*;

// ═══════════════════════════════════════════
// Column codecs
// ═══════════════════════════════════════════

pub(crate) fn fmt_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_uuid(field: &str, value: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(value).map_err(|_| DatabaseError::InvalidValue {
        field: field.into(),
        value: value.into(),
    })
}

pub(crate) fn parse_date(field: &str, value: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| DatabaseError::InvalidValue {
        field: field.into(),
        value: value.into(),
    })
}

pub(crate) fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| DatabaseError::InvalidValue {
            field: field.into(),
            value: value.into(),
        })
}

// ═══════════════════════════════════════════
// Dynamic WHERE clauses for filtered listings
// ═══════════════════════════════════════════

/// Accumulates `AND` conditions with numbered parameters.
#[derive(Default)]
pub(crate) struct WhereClause {
    conditions: Vec<String>,
    params: Vec<Box<dyn ToSql>>,
}

impl WhereClause {
    /// Add a condition; `{}` in `template` is replaced by the parameter slot.
    pub(crate) fn push(&mut self, template: &str, value: impl ToSql + 'static) {
        self.params.push(Box::new(value));
        let slot = format!("?{}", self.params.len());
        self.conditions.push(template.replace("{}", &slot));
    }

    pub(crate) fn sql(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }

    /// Parameter slot that the next pushed value would take.
    pub(crate) fn next_slot(&self) -> usize {
        self.params.len() + 1
    }

    pub(crate) fn params(&self) -> Vec<&dyn ToSql> {
        self.params.iter().map(|p| p.as_ref()).collect()
    }

    /// Parameters followed by extra trailing values (LIMIT / OFFSET).
    pub(crate) fn params_with<'a>(&'a self, extra: &'a [&'a dyn ToSql]) -> Vec<&'a dyn ToSql> {
        let mut all = self.params();
        all.extend_from_slice(extra);
        all
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_where_clause_renders_nothing() {
        let clause = WhereClause::default();
        assert_eq!(clause.sql(), "");
        assert!(clause.params().is_empty());
    }

    #[test]
    fn where_clause_numbers_parameters_in_order() {
        let mut clause = WhereClause::default();
        clause.push("a = {}", 1);
        clause.push("b = {}", "x".to_string());
        assert_eq!(clause.sql(), " WHERE a = ?1 AND b = ?2");
        assert_eq!(clause.next_slot(), 3);
    }

    #[test]
    fn timestamps_round_trip() {
        let now = Utc::now();
        let parsed = parse_timestamp("t", &fmt_timestamp(&now)).unwrap();
        assert_eq!(parsed.timestamp_micros(), now.timestamp_micros());
    }

    #[test]
    fn malformed_uuid_reports_field() {
        let err = parse_uuid("doctor_id", "nope").unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidValue { field, .. } if field == "doctor_id"));
    }
}
