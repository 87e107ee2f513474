use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::HealthStatus;

/// Clinical note written by a doctor for a patient over a date range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prescription {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub text: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// False while any uploaded day is still waiting for review.
    pub checked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Prescription {
    pub fn covers(&self, day: NaiveDate) -> bool {
        self.start_date <= day && day <= self.end_date
    }
}

/// One scheduled upload day of a prescription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilePrescription {
    pub id: Uuid,
    pub prescription_id: Uuid,
    pub day: NaiveDate,
    pub uploaded: bool,
    pub checked: bool,
    pub status: HealthStatus,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FilePrescription {
    pub fn new(prescription_id: Uuid, day: NaiveDate, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            prescription_id,
            day,
            uploaded: false,
            checked: false,
            status: HealthStatus::Unknown,
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 1-based position of this day inside a schedule starting at `start`.
    pub fn day_number(&self, start: NaiveDate) -> i64 {
        (self.day - start).num_days() + 1
    }
}

/// Progress counters over a prescription's schedule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScheduleSummary {
    pub days_total: u32,
    pub days_uploaded: u32,
    pub days_checked: u32,
}
