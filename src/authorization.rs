//! Role and ownership authorization.
//!
//! Every protected operation checks the authenticated [`AuthUser`] against
//! a list of permissions. A list passes if any entry passes; superusers pass
//! everything. Default-deny.
//!
//! Resource rules:
//! 1. Prescription read → writer doctor, the patient, superuser
//! 2. Prescription write / delete / review / doctor upload → writer doctor, superuser
//! 3. Patient upload → the prescription's patient only
//! 4. Data file read → anyone who can read the owning prescription
//! 5. Data file delete → the uploader, superuser
//! 6. Patient profile read → the patient, any doctor, superuser
//! 7. Account changes → owner, superuser

use serde::Serialize;
use uuid::Uuid;

use crate::models::enums::Role;
use crate::models::{BaseUser, DataFile, Prescription, Scope};

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// The caller of a protected request, injected by the auth middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
    pub is_superuser: bool,
}

impl AuthUser {
    pub fn is_doctor(&self) -> bool {
        self.role == Role::Doctor
    }

    pub fn is_patient(&self) -> bool {
        self.role == Role::Patient
    }

    /// Listing scope for this caller.
    pub fn scope(&self) -> Scope {
        if self.is_superuser {
            Scope::All
        } else {
            match self.role {
                Role::Doctor => Scope::Doctor(self.id),
                Role::Patient => Scope::Patient(self.id),
                // Staff without superuser see nothing scoped to them.
                Role::Staff => Scope::Patient(self.id),
            }
        }
    }
}

impl From<&BaseUser> for AuthUser {
    fn from(user: &BaseUser) -> Self {
        Self {
            id: user.id,
            role: user.role,
            is_superuser: user.is_superuser,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    IsDoctor,
    IsPatient,
    IsSuperuser,
    /// The caller is the given user.
    IsOwner(Uuid),
}

impl Permission {
    fn allows(self, user: &AuthUser) -> bool {
        match self {
            Self::IsDoctor => user.is_doctor(),
            Self::IsPatient => user.is_patient(),
            Self::IsSuperuser => user.is_superuser,
            Self::IsOwner(owner) => user.id == owner,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("Permission denied: {0}")]
pub struct AccessDenied(pub String);

// ═══════════════════════════════════════════════════════════
// Checks
// ═══════════════════════════════════════════════════════════

/// Pass if the caller is a superuser or any permission allows it.
pub fn require(user: &AuthUser, permissions: &[Permission]) -> Result<(), AccessDenied> {
    if user.is_superuser || permissions.iter().any(|p| p.allows(user)) {
        Ok(())
    } else {
        Err(AccessDenied(describe(permissions)))
    }
}

fn describe(permissions: &[Permission]) -> String {
    let names: Vec<&str> = permissions
        .iter()
        .map(|p| match p {
            Permission::IsDoctor => "doctor",
            Permission::IsPatient => "patient",
            Permission::IsSuperuser => "superuser",
            Permission::IsOwner(_) => "owner",
        })
        .collect();
    format!("requires {}", names.join(" or "))
}

pub fn can_read_prescription(user: &AuthUser, p: &Prescription) -> Result<(), AccessDenied> {
    require(
        user,
        &[Permission::IsOwner(p.doctor_id), Permission::IsOwner(p.patient_id)],
    )
}

/// Edit, delete, review days and attach doctor files.
pub fn can_write_prescription(user: &AuthUser, p: &Prescription) -> Result<(), AccessDenied> {
    require(user, &[Permission::IsOwner(p.doctor_id)])
}

/// Patient uploads are personal: superusers do not upload on a patient's behalf.
pub fn can_upload_for_day(user: &AuthUser, p: &Prescription) -> Result<(), AccessDenied> {
    if user.is_patient() && user.id == p.patient_id {
        Ok(())
    } else {
        Err(AccessDenied("only the prescription's patient can upload".into()))
    }
}

pub fn can_read_data_file(
    user: &AuthUser,
    owning: &Prescription,
) -> Result<(), AccessDenied> {
    can_read_prescription(user, owning)
}

pub fn can_delete_data_file(user: &AuthUser, file: &DataFile) -> Result<(), AccessDenied> {
    require(user, &[Permission::IsOwner(file.uploader_id)])
}

pub fn can_read_patient(user: &AuthUser, patient_id: Uuid) -> Result<(), AccessDenied> {
    require(user, &[Permission::IsDoctor, Permission::IsOwner(patient_id)])
}

pub fn can_manage_account(user: &AuthUser, account_id: Uuid) -> Result<(), AccessDenied> {
    require(user, &[Permission::IsOwner(account_id)])
}
