//! Account lifecycle: registration, login, token refresh, logout,
//! password change, profile edits, deactivation and the bootstrap
//! superuser.
//!
//! The refresh-token expiry is mirrored onto `users.token_expires_at`.
//! Clearing it revokes every token issued to the user, which is how
//! logout, password change and deactivation take effect immediately.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::{self, CryptoError, JwtKeys, TokenKind, TokenPair, TokenTtl};
use crate::db::repository;
use crate::db::DatabaseError;
use crate::models::enums::Role;
use crate::models::{BaseUser, Doctor, DoctorProfile, Patient, PatientProfile};

static EMAIL_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());

const MAX_NAME_CHARS: usize = 150;

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("Invalid email address")]
    InvalidEmail,
    #[error("Invalid {0}")]
    InvalidField(&'static str),
    #[error("{0}")]
    WeakPassword(String),
    #[error("An account with this email already exists")]
    EmailTaken,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Session revoked, please log in again")]
    SessionRevoked,
    #[error("Account not found")]
    NotFound,
    #[error("Credential error: {0}")]
    Crypto(CryptoError),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<CryptoError> for AccountError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::WeakPassword(reason) => Self::WeakPassword(reason),
            other => Self::Crypto(other),
        }
    }
}

impl From<rusqlite::Error> for AccountError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.into())
    }
}

// ═══════════════════════════════════════════════════════════
// Request / response types
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterAccount {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterDoctor {
    #[serde(flatten)]
    pub account: RegisterAccount,
    #[serde(default)]
    pub specialty: Option<String>,
    #[serde(default)]
    pub license_number: Option<String>,
    #[serde(default)]
    pub hospital: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterPatient {
    #[serde(flatten)]
    pub account: RegisterAccount,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Partial profile edit. Role-specific fields are ignored for other roles.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub specialty: Option<String>,
    pub license_number: Option<String>,
    pub hospital: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub phone: Option<String>,
}

/// Account with its role profile, as shown by `/users/me`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Account {
    Doctor(DoctorProfile),
    Patient(PatientProfile),
    Staff(BaseUser),
}

impl Account {
    pub fn user(&self) -> &BaseUser {
        match self {
            Self::Doctor(p) => &p.user,
            Self::Patient(p) => &p.user,
            Self::Staff(u) => u,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub user: BaseUser,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshResponse {
    pub access: String,
    pub access_expires_at: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════
// Validation
// ═══════════════════════════════════════════════════════════

fn normalize_email(email: &str) -> Result<String, AccountError> {
    let email = email.trim().to_lowercase();
    let valid = EMAIL_PATTERN
        .as_ref()
        .is_some_and(|re| re.is_match(&email));
    if valid && email.len() <= 254 {
        Ok(email)
    } else {
        Err(AccountError::InvalidEmail)
    }
}

fn clean_name(value: &str, field: &'static str) -> Result<String, AccountError> {
    let value = value.trim();
    if value.is_empty() || value.chars().count() > MAX_NAME_CHARS {
        return Err(AccountError::InvalidField(field));
    }
    Ok(value.to_string())
}

/// Trim optional free text; blank becomes `None`.
fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn new_user(account: &RegisterAccount, role: Role, now: DateTime<Utc>) -> Result<BaseUser, AccountError> {
    let email = normalize_email(&account.email)?;
    let first_name = clean_name(&account.first_name, "first_name")?;
    let last_name = clean_name(&account.last_name, "last_name")?;
    crypto::validate_password(&account.password, &email)?;

    Ok(BaseUser {
        id: Uuid::new_v4(),
        email,
        password_hash: crypto::hash_password(&account.password)?,
        first_name,
        last_name,
        role,
        is_superuser: false,
        is_active: true,
        token_expires_at: None,
        created_at: now,
        updated_at: now,
    })
}

fn insert_user_checked(conn: &Connection, user: &BaseUser) -> Result<(), AccountError> {
    match repository::insert_user(conn, user) {
        Err(DatabaseError::ConstraintViolation(_)) => Err(AccountError::EmailTaken),
        other => Ok(other?),
    }
}

// ═══════════════════════════════════════════════════════════
// Operations
// ═══════════════════════════════════════════════════════════

pub fn register_doctor(conn: &mut Connection, req: RegisterDoctor) -> Result<DoctorProfile, AccountError> {
    let user = new_user(&req.account, Role::Doctor, Utc::now())?;
    let doctor = Doctor {
        user_id: user.id,
        specialty: clean_optional(req.specialty),
        license_number: clean_optional(req.license_number),
        hospital: clean_optional(req.hospital),
    };

    let tx = conn.transaction()?;
    insert_user_checked(&tx, &user)?;
    repository::insert_doctor(&tx, &doctor)?;
    tx.commit()?;

    tracing::info!(user_id = %user.id, "Registered doctor");
    Ok(DoctorProfile {
        user,
        specialty: doctor.specialty,
        license_number: doctor.license_number,
        hospital: doctor.hospital,
    })
}

pub fn register_patient(conn: &mut Connection, req: RegisterPatient) -> Result<PatientProfile, AccountError> {
    let now = Utc::now();
    if req.birth_date.is_some_and(|d| d > now.date_naive()) {
        return Err(AccountError::InvalidField("birth_date"));
    }
    let user = new_user(&req.account, Role::Patient, now)?;
    let patient = Patient {
        user_id: user.id,
        birth_date: req.birth_date,
        phone: clean_optional(req.phone),
    };

    let tx = conn.transaction()?;
    insert_user_checked(&tx, &user)?;
    repository::insert_patient(&tx, &patient)?;
    tx.commit()?;

    tracing::info!(user_id = %user.id, "Registered patient");
    Ok(PatientProfile {
        user,
        birth_date: patient.birth_date,
        phone: patient.phone,
    })
}

/// Verify credentials and issue a token pair. Unknown, inactive and
/// wrong-password logins are indistinguishable to the caller.
pub fn login(
    conn: &Connection,
    keys: &JwtKeys,
    ttl: &TokenTtl,
    email: &str,
    password: &str,
) -> Result<LoginResponse, AccountError> {
    let Some(mut user) = repository::get_user_by_email(conn, email)? else {
        return Err(AccountError::InvalidCredentials);
    };
    if !user.is_active || !crypto::verify_password(password, &user.password_hash)? {
        return Err(AccountError::InvalidCredentials);
    }

    let now = Utc::now();
    let tokens = crypto::issue_token_pair(&user, keys, ttl, now)?;
    repository::set_token_expiry(conn, &user.id, Some(&tokens.refresh_expires_at))?;
    user.token_expires_at = Some(tokens.refresh_expires_at);

    tracing::info!(user_id = %user.id, "User logged in");
    Ok(LoginResponse { user, tokens })
}

/// Exchange a refresh token for a new access token.
pub fn refresh(
    conn: &Connection,
    keys: &JwtKeys,
    ttl: &TokenTtl,
    refresh_token: &str,
) -> Result<RefreshResponse, AccountError> {
    let claims = crypto::decode_token(refresh_token, TokenKind::Refresh, keys)?;
    let user = repository::get_user(conn, &claims.user_id()?)?.ok_or(AccountError::SessionRevoked)?;

    let now = Utc::now();
    if !user.accepts_session(claims.session, now) {
        return Err(AccountError::SessionRevoked);
    }
    let (access, access_expires_at) =
        crypto::issue_access_token(&user, claims.session, keys, ttl, now)?;
    Ok(RefreshResponse {
        access,
        access_expires_at,
    })
}

/// Revoke every outstanding token for the user.
pub fn logout(conn: &Connection, user_id: &Uuid) -> Result<(), AccountError> {
    repository::set_token_expiry(conn, user_id, None)?;
    tracing::info!(user_id = %user_id, "User logged out");
    Ok(())
}

pub fn change_password(
    conn: &mut Connection,
    user_id: &Uuid,
    old_password: &str,
    new_password: &str,
) -> Result<(), AccountError> {
    let user = repository::get_user(conn, user_id)?.ok_or(AccountError::NotFound)?;
    if !crypto::verify_password(old_password, &user.password_hash)? {
        return Err(AccountError::InvalidCredentials);
    }
    if old_password == new_password {
        return Err(AccountError::WeakPassword("new password must differ from the old one".into()));
    }
    crypto::validate_password(new_password, &user.email)?;

    let hash = crypto::hash_password(new_password)?;
    let tx = conn.transaction()?;
    repository::update_password_hash(&tx, user_id, &hash, &Utc::now())?;
    repository::set_token_expiry(&tx, user_id, None)?;
    tx.commit()?;
    tracing::info!(user_id = %user_id, "Password changed, tokens revoked");
    Ok(())
}

/// Load an account with its role profile.
pub fn get_account(conn: &Connection, user_id: &Uuid) -> Result<Account, AccountError> {
    let user = repository::get_user(conn, user_id)?.ok_or(AccountError::NotFound)?;
    let role = user.role;
    let account = match role {
        Role::Doctor => repository::get_doctor_profile(conn, user_id)?.map(Account::Doctor),
        Role::Patient => repository::get_patient_profile(conn, user_id)?.map(Account::Patient),
        Role::Staff => Some(Account::Staff(user)),
    };
    account.ok_or(AccountError::NotFound)
}

pub fn update_profile(
    conn: &mut Connection,
    user_id: &Uuid,
    changes: UpdateProfile,
) -> Result<Account, AccountError> {
    let current = get_account(conn, user_id)?;
    let now = Utc::now();

    let user = current.user();
    let first_name = match &changes.first_name {
        Some(name) => clean_name(name, "first_name")?,
        None => user.first_name.clone(),
    };
    let last_name = match &changes.last_name {
        Some(name) => clean_name(name, "last_name")?,
        None => user.last_name.clone(),
    };
    if changes.birth_date.is_some_and(|d| d > now.date_naive()) {
        return Err(AccountError::InvalidField("birth_date"));
    }

    let tx = conn.transaction()?;
    repository::update_user_names(&tx, user_id, &first_name, &last_name, &now)?;
    match &current {
        Account::Doctor(profile) => {
            let doctor = Doctor {
                user_id: *user_id,
                specialty: changes.specialty.map_or(profile.specialty.clone(), |v| clean_optional(Some(v))),
                license_number: changes
                    .license_number
                    .map_or(profile.license_number.clone(), |v| clean_optional(Some(v))),
                hospital: changes.hospital.map_or(profile.hospital.clone(), |v| clean_optional(Some(v))),
            };
            repository::update_doctor(&tx, &doctor)?;
        }
        Account::Patient(profile) => {
            let patient = Patient {
                user_id: *user_id,
                birth_date: changes.birth_date.or(profile.birth_date),
                phone: changes.phone.map_or(profile.phone.clone(), |v| clean_optional(Some(v))),
            };
            repository::update_patient(&tx, &patient)?;
        }
        Account::Staff(_) => {}
    }
    tx.commit()?;

    get_account(conn, user_id)
}

/// Deactivate an account and revoke its tokens. Data is kept.
pub fn deactivate(conn: &mut Connection, user_id: &Uuid) -> Result<(), AccountError> {
    let tx = conn.transaction()?;
    match repository::set_user_active(&tx, user_id, false, &Utc::now()) {
        Err(DatabaseError::NotFound { .. }) => return Err(AccountError::NotFound),
        other => other?,
    }
    repository::set_token_expiry(&tx, user_id, None)?;
    tx.commit()?;
    tracing::info!(user_id = %user_id, "Account deactivated");
    Ok(())
}

/// Make sure a superuser with `email` exists. Creates a staff account on
/// first run; promotes and reactivates an existing account otherwise. The
/// password of an existing account is left alone.
pub fn ensure_superuser(conn: &Connection, email: &str, password: &str) -> Result<BaseUser, AccountError> {
    let email = normalize_email(email)?;
    let now = Utc::now();

    if let Some(mut user) = repository::get_user_by_email(conn, &email)? {
        if !user.is_superuser {
            repository::set_superuser(conn, &user.id, true)?;
            user.is_superuser = true;
            tracing::info!(user_id = %user.id, "Promoted existing account to superuser");
        }
        if !user.is_active {
            repository::set_user_active(conn, &user.id, true, &now)?;
            user.is_active = true;
        }
        return Ok(user);
    }

    crypto::validate_password(password, &email)?;
    let user = BaseUser {
        id: Uuid::new_v4(),
        email,
        password_hash: crypto::hash_password(password)?,
        first_name: "Admin".into(),
        last_name: "User".into(),
        role: Role::Staff,
        is_superuser: true,
        is_active: true,
        token_expires_at: None,
        created_at: now,
        updated_at: now,
    };
    insert_user_checked(conn, &user)?;
    tracing::info!(user_id = %user.id, "Created bootstrap superuser");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn keys() -> JwtKeys {
        JwtKeys::from_secret(&[7u8; 32]).unwrap()
    }

    fn account(email: &str) -> RegisterAccount {
        RegisterAccount {
            email: email.into(),
            password: "s3cure-passphrase".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
        }
    }

    fn register_test_doctor(conn: &mut Connection, email: &str) -> DoctorProfile {
        register_doctor(
            conn,
            RegisterDoctor {
                account: account(email),
                specialty: Some(" Cardiology ".into()),
                license_number: None,
                hospital: Some("".into()),
            },
        )
        .unwrap()
    }

    fn register_test_patient(conn: &mut Connection, email: &str) -> PatientProfile {
        register_patient(
            conn,
            RegisterPatient {
                account: account(email),
                birth_date: NaiveDate::from_ymd_opt(1990, 5, 17),
                phone: Some("+33 6 12 34 56 78".into()),
            },
        )
        .unwrap()
    }

    #[test]
    fn register_doctor_creates_user_and_profile() {
        let mut conn = open_memory_database().unwrap();
        let doctor = register_test_doctor(&mut conn, "House@Example.com");
        assert_eq!(doctor.user.email, "house@example.com");
        assert_eq!(doctor.user.role, Role::Doctor);
        assert_eq!(doctor.specialty.as_deref(), Some("Cardiology"));
        assert!(doctor.hospital.is_none());

        let stored = repository::get_doctor_profile(&conn, &doctor.user.id).unwrap().unwrap();
        assert_eq!(stored.user.email, "house@example.com");
        assert!(stored.user.password_hash.starts_with("$argon2id$"));
    }

    #[test]
    fn duplicate_email_is_rejected_case_insensitively() {
        let mut conn = open_memory_database().unwrap();
        register_test_patient(&mut conn, "pat@example.com");
        let err = register_doctor(
            &mut conn,
            RegisterDoctor {
                account: account("PAT@example.com"),
                specialty: None,
                license_number: None,
                hospital: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, AccountError::EmailTaken));
    }

    #[test]
    fn registration_validates_input() {
        let mut conn = open_memory_database().unwrap();

        let mut bad_email = account("not-an-email");
        let err = register_patient(
            &mut conn,
            RegisterPatient { account: bad_email.clone(), birth_date: None, phone: None },
        )
        .unwrap_err();
        assert!(matches!(err, AccountError::InvalidEmail));

        bad_email.email = "ok@example.com".into();
        bad_email.first_name = "   ".into();
        let err = register_patient(
            &mut conn,
            RegisterPatient { account: bad_email.clone(), birth_date: None, phone: None },
        )
        .unwrap_err();
        assert!(matches!(err, AccountError::InvalidField("first_name")));

        bad_email.first_name = "Ok".into();
        bad_email.password = "12345678".into();
        let err = register_patient(
            &mut conn,
            RegisterPatient { account: bad_email, birth_date: None, phone: None },
        )
        .unwrap_err();
        assert!(matches!(err, AccountError::WeakPassword(_)));
    }

    #[test]
    fn login_mirrors_refresh_expiry() {
        let mut conn = open_memory_database().unwrap();
        let patient = register_test_patient(&mut conn, "p@example.com");

        let login = login(&conn, &keys(), &TokenTtl::default(), "p@example.com", "s3cure-passphrase").unwrap();
        assert_eq!(login.user.id, patient.user.id);

        let stored = repository::get_user(&conn, &patient.user.id).unwrap().unwrap();
        let mirrored = stored.token_expires_at.unwrap();
        assert_eq!(mirrored.timestamp(), login.tokens.refresh_expires_at.timestamp());
    }

    #[test]
    fn login_failures_look_the_same() {
        let mut conn = open_memory_database().unwrap();
        let doctor = register_test_doctor(&mut conn, "d@example.com");
        let ttl = TokenTtl::default();

        let wrong = login(&conn, &keys(), &ttl, "d@example.com", "wrong-passphrase").unwrap_err();
        let unknown = login(&conn, &keys(), &ttl, "nobody@example.com", "s3cure-passphrase").unwrap_err();
        deactivate(&mut conn, &doctor.user.id).unwrap();
        let inactive = login(&conn, &keys(), &ttl, "d@example.com", "s3cure-passphrase").unwrap_err();

        for err in [wrong, unknown, inactive] {
            assert!(matches!(err, AccountError::InvalidCredentials));
        }
    }

    #[test]
    fn refresh_requires_live_session() {
        let mut conn = open_memory_database().unwrap();
        let patient = register_test_patient(&mut conn, "p@example.com");
        let ttl = TokenTtl::default();
        let session = login(&conn, &keys(), &ttl, "p@example.com", "s3cure-passphrase").unwrap();

        let refreshed = refresh(&conn, &keys(), &ttl, &session.tokens.refresh).unwrap();
        let claims = crypto::decode_token(&refreshed.access, TokenKind::Access, &keys()).unwrap();
        assert_eq!(claims.user_id().unwrap(), patient.user.id);

        // An access token cannot be used to refresh
        assert!(refresh(&conn, &keys(), &ttl, &session.tokens.access).is_err());

        logout(&conn, &patient.user.id).unwrap();
        let err = refresh(&conn, &keys(), &ttl, &session.tokens.refresh).unwrap_err();
        assert!(matches!(err, AccountError::SessionRevoked));
    }

    #[test]
    fn change_password_revokes_tokens() {
        let mut conn = open_memory_database().unwrap();
        let doctor = register_test_doctor(&mut conn, "d@example.com");
        let ttl = TokenTtl::default();
        login(&conn, &keys(), &ttl, "d@example.com", "s3cure-passphrase").unwrap();

        let err = change_password(&mut conn, &doctor.user.id, "wrong-passphrase", "another-passphrase")
            .unwrap_err();
        assert!(matches!(err, AccountError::InvalidCredentials));

        change_password(&mut conn, &doctor.user.id, "s3cure-passphrase", "another-passphrase").unwrap();
        let stored = repository::get_user(&conn, &doctor.user.id).unwrap().unwrap();
        assert!(stored.token_expires_at.is_none());

        assert!(login(&conn, &keys(), &ttl, "d@example.com", "s3cure-passphrase").is_err());
        assert!(login(&conn, &keys(), &ttl, "d@example.com", "another-passphrase").is_ok());
    }

    #[test]
    fn new_login_does_not_revive_revoked_tokens() {
        let mut conn = open_memory_database().unwrap();
        let doctor = register_test_doctor(&mut conn, "d@example.com");
        let ttl = TokenTtl::default();
        let stolen = login(&conn, &keys(), &ttl, "d@example.com", "s3cure-passphrase").unwrap();

        change_password(&mut conn, &doctor.user.id, "s3cure-passphrase", "another-passphrase").unwrap();
        let current = login(&conn, &keys(), &ttl, "d@example.com", "another-passphrase").unwrap();

        let err = refresh(&conn, &keys(), &ttl, &stolen.tokens.refresh).unwrap_err();
        assert!(matches!(err, AccountError::SessionRevoked));
        assert!(refresh(&conn, &keys(), &ttl, &current.tokens.refresh).is_ok());

        logout(&conn, &doctor.user.id).unwrap();
        let again = login(&conn, &keys(), &ttl, "d@example.com", "another-passphrase").unwrap();
        let err = refresh(&conn, &keys(), &ttl, &current.tokens.refresh).unwrap_err();
        assert!(matches!(err, AccountError::SessionRevoked));
        assert!(refresh(&conn, &keys(), &ttl, &again.tokens.refresh).is_ok());
    }

    #[test]
    fn refreshed_access_token_stays_in_its_session() {
        let mut conn = open_memory_database().unwrap();
        register_test_patient(&mut conn, "p@example.com");
        let ttl = TokenTtl::default();
        let session = login(&conn, &keys(), &ttl, "p@example.com", "s3cure-passphrase").unwrap();

        let refreshed = refresh(&conn, &keys(), &ttl, &session.tokens.refresh).unwrap();
        let claims = crypto::decode_token(&refreshed.access, TokenKind::Access, &keys()).unwrap();
        let user = repository::get_user(&conn, &session.user.id).unwrap().unwrap();
        assert!(user.accepts_session(claims.session, Utc::now()));
    }

    fn block_token_revocation(conn: &Connection) {
        conn.execute_batch(
            "CREATE TRIGGER block_revocation BEFORE UPDATE OF token_expires_at ON users
             BEGIN SELECT RAISE(ABORT, 'revocation blocked'); END;",
        )
        .unwrap();
    }

    #[test]
    fn password_change_rolls_back_when_revocation_fails() {
        let mut conn = open_memory_database().unwrap();
        let doctor = register_test_doctor(&mut conn, "d@example.com");
        block_token_revocation(&conn);

        let result = change_password(&mut conn, &doctor.user.id, "s3cure-passphrase", "another-passphrase");
        assert!(matches!(result, Err(AccountError::Database(_))));

        let stored = repository::get_user(&conn, &doctor.user.id).unwrap().unwrap();
        assert!(crypto::verify_password("s3cure-passphrase", &stored.password_hash).unwrap());
    }

    #[test]
    fn deactivation_rolls_back_when_revocation_fails() {
        let mut conn = open_memory_database().unwrap();
        let patient = register_test_patient(&mut conn, "p@example.com");
        block_token_revocation(&conn);

        assert!(matches!(deactivate(&mut conn, &patient.user.id), Err(AccountError::Database(_))));

        let stored = repository::get_user(&conn, &patient.user.id).unwrap().unwrap();
        assert!(stored.is_active);
    }

    #[test]
    fn update_profile_touches_role_fields() {
        let mut conn = open_memory_database().unwrap();
        let patient = register_test_patient(&mut conn, "p@example.com");

        let updated = update_profile(
            &mut conn,
            &patient.user.id,
            UpdateProfile {
                first_name: Some("Grace".into()),
                phone: Some("  ".into()),
                specialty: Some("ignored".into()),
                ..Default::default()
            },
        )
        .unwrap();

        match updated {
            Account::Patient(profile) => {
                assert_eq!(profile.user.first_name, "Grace");
                assert_eq!(profile.user.last_name, "Lovelace");
                assert!(profile.phone.is_none());
                assert_eq!(profile.birth_date, NaiveDate::from_ymd_opt(1990, 5, 17));
            }
            other => panic!("expected patient account, got {other:?}"),
        }
    }

    #[test]
    fn deactivate_unknown_user_is_not_found() {
        let mut conn = open_memory_database().unwrap();
        assert!(matches!(deactivate(&mut conn, &Uuid::new_v4()), Err(AccountError::NotFound)));
    }

    #[test]
    fn ensure_superuser_is_idempotent() {
        let conn = open_memory_database().unwrap();
        let first = ensure_superuser(&conn, "root@example.com", "bootstrap-passphrase").unwrap();
        let second = ensure_superuser(&conn, "root@example.com", "bootstrap-passphrase").unwrap();
        assert_eq!(first.id, second.id);
        assert!(second.is_superuser);
        assert_eq!(second.role, Role::Staff);
    }

    #[test]
    fn ensure_superuser_promotes_existing_account() {
        let mut conn = open_memory_database().unwrap();
        let doctor = register_test_doctor(&mut conn, "d@example.com");
        let promoted = ensure_superuser(&conn, "d@example.com", "irrelevant-passphrase").unwrap();
        assert_eq!(promoted.id, doctor.user.id);
        assert!(promoted.is_superuser);
        assert_eq!(promoted.role, Role::Doctor);
    }
}
