//! User account model shared by patients and doctors.
//!
//! # Responsibility
//! - Define the canonical account record and its role.
//! - Provide soft-delete helpers (`is_active`) instead of physical removal.
//!
//! # Invariants
//! - `phone` is stored in normalized form and is unique across users.
//! - `email`, when present, is lowercased and unique across users.
//! - `password_hash` is opaque to core and never serialized.

use crate::model::validation::{
    normalize_email, normalize_phone, require_non_blank, require_non_nil, ValidationError,
    ValidationResult,
};
use crate::model::EntityId;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Account role. Decides which relations a user may own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Patient,
    Doctor,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Doctor => "doctor",
        }
    }
}

impl Display for UserRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical account record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: EntityId,
    pub role: UserRole,
    pub name: String,
    /// Normalized digits with optional leading `+`.
    pub phone: String,
    pub email: Option<String>,
    /// Opaque credential supplied by the auth layer.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    /// Soft-delete flag. `false` means the account was deleted.
    pub is_active: bool,
    /// Epoch milliseconds of the last recorded activity.
    pub last_active_at: Option<i64>,
    /// Epoch milliseconds, stamped by storage.
    pub created_at: i64,
    /// Epoch milliseconds, stamped by storage.
    pub updated_at: i64,
}

impl User {
    /// Creates an active user with a generated id and normalized phone.
    ///
    /// # Errors
    /// - Returns `InvalidPhone` when the phone cannot be normalized.
    /// - Returns `BlankField` for blank name or credential.
    pub fn new(
        role: UserRole,
        name: impl Into<String>,
        phone: &str,
        password_hash: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let user = Self {
            id: Uuid::new_v4(),
            role,
            name: name.into().trim().to_string(),
            phone: normalize_phone(phone)?,
            email: None,
            password_hash: password_hash.into(),
            is_active: true,
            last_active_at: None,
            created_at: 0,
            updated_at: 0,
        };
        user.validate()?;
        Ok(user)
    }

    /// Replaces the email with its normalized form. Blank clears it.
    pub fn set_email(&mut self, email: Option<&str>) -> ValidationResult {
        self.email = normalize_email(email)?;
        Ok(())
    }

    /// Replaces the phone with its normalized form.
    pub fn set_phone(&mut self, phone: &str) -> ValidationResult {
        self.phone = normalize_phone(phone)?;
        Ok(())
    }

    /// Checks field-level invariants.
    pub fn validate(&self) -> ValidationResult {
        require_non_nil("user.id", &self.id)?;
        require_non_blank("user.name", &self.name)?;
        require_non_blank("user.password_hash", &self.password_hash)?;
        if normalize_phone(&self.phone)? != self.phone {
            return Err(ValidationError::InvalidPhone);
        }
        if let Some(email) = self.email.as_deref() {
            if normalize_email(Some(email))?.as_deref() != Some(email) {
                return Err(ValidationError::InvalidEmail);
            }
        }
        Ok(())
    }

    /// Marks this account as deleted without removing it.
    pub fn deactivate(&mut self) {
        self.is_active = false;
    }

    pub fn reactivate(&mut self) {
        self.is_active = true;
    }

    pub fn is_doctor(&self) -> bool {
        self.role == UserRole::Doctor
    }

    pub fn is_patient(&self) -> bool {
        self.role == UserRole::Patient
    }
}
