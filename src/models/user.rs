use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Role;

/// Authentication identity shared by doctors, patients and staff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseUser {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub is_superuser: bool,
    pub is_active: bool,
    /// Expiry of the most recently issued refresh token. `None` after
    /// logout, password change or deactivation. Also identifies the
    /// current login session: tokens carry it as their `session` claim.
    pub token_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BaseUser {
    /// Whether tokens from the login session `session` may still be
    /// honoured at `now`. A new login starts a new session, so tokens from
    /// an earlier one stay dead after logout or a password change.
    pub fn accepts_session(&self, session: i64, now: DateTime<Utc>) -> bool {
        self.is_active
            && self
                .token_expires_at
                .is_some_and(|exp| exp > now && session_key(&exp) == session)
    }
}

/// Session identifier carried in token claims: the session's refresh
/// expiry in microseconds.
pub fn session_key(refresh_expires_at: &DateTime<Utc>) -> i64 {
    refresh_expires_at.timestamp_micros()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Doctor {
    pub user_id: Uuid,
    pub specialty: Option<String>,
    pub license_number: Option<String>,
    pub hospital: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Patient {
    pub user_id: Uuid,
    pub birth_date: Option<NaiveDate>,
    pub phone: Option<String>,
}

/// A doctor row joined with its account.
#[derive(Debug, Clone, Serialize)]
pub struct DoctorProfile {
    #[serde(flatten)]
    pub user: BaseUser,
    pub specialty: Option<String>,
    pub license_number: Option<String>,
    pub hospital: Option<String>,
}

/// A patient row joined with its account.
#[derive(Debug, Clone, Serialize)]
pub struct PatientProfile {
    #[serde(flatten)]
    pub user: BaseUser,
    pub birth_date: Option<NaiveDate>,
    pub phone: Option<String>,
}
