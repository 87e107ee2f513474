use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// File uploaded by a doctor (attached to a prescription) or by a patient
/// (attached to one scheduled day).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataFile {
    pub id: Uuid,
    pub uploader_id: Uuid,
    pub prescription_id: Option<Uuid>,
    pub file_prescription_id: Option<Uuid>,
    pub original_name: String,
    #[serde(skip_serializing, default)]
    pub stored_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub sha256: String,
    pub checked: bool,
    pub created_at: DateTime<Utc>,
}

/// What a data file hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFileOwner {
    Prescription(Uuid),
    FilePrescription(Uuid),
}
