//! Field-level validation shared by all domain records.
//!
//! # Responsibility
//! - Normalize contact fields (phone, email) into their canonical form.
//! - Report every field violation through one typed error.
//!
//! # Invariants
//! - Normalizers are pure; they never touch storage.
//! - Error messages carry field names only, never the rejected value for
//!   contact or credential fields.

use crate::model::consultation::ConsultationStatus;
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?[0-9]{6,15}$").expect("valid phone regex"));
static PHONE_SEPARATORS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s\-\.\(\)]+").expect("valid phone separator regex"));
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex")
});
static BLOOD_PRESSURE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{2,3})/(\d{2,3})$").expect("valid blood pressure regex"));

/// Validation failures raised before any record reaches storage.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Identifier is the nil UUID.
    NilId(&'static str),
    /// Required text field is blank after trim.
    BlankField(&'static str),
    /// Phone number does not match the accepted shape.
    InvalidPhone,
    /// Email does not match the accepted shape.
    InvalidEmail,
    /// Numeric field is outside its accepted range.
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    /// Blood pressure is not `SYS/DIA` or systolic is not above diastolic.
    InvalidBloodPressure(String),
    /// Measurement carries neither vitals nor notes.
    EmptyMeasurement,
    /// Doctor assignment does not agree with consultation status.
    DoctorStatusMismatch {
        status: ConsultationStatus,
        has_doctor: bool,
    },
    /// A later timestamp precedes an earlier one.
    TimestampOrder {
        earlier: &'static str,
        later: &'static str,
    },
    /// Patient and doctor refer to the same user.
    SameParticipant,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId(field) => write!(f, "{field} must not be the nil uuid"),
            Self::BlankField(field) => write!(f, "{field} must not be blank"),
            Self::InvalidPhone => write!(f, "phone must contain 6 to 15 digits"),
            Self::InvalidEmail => write!(f, "email is not a valid address"),
            Self::OutOfRange {
                field,
                value,
                min,
                max,
            } => write!(f, "{field} ({value}) must be within [{min}, {max}]"),
            Self::InvalidBloodPressure(value) => {
                write!(f, "blood_pressure `{value}` must look like `120/80`")
            }
            Self::EmptyMeasurement => {
                write!(f, "measurement must include at least one vital sign or notes")
            }
            Self::DoctorStatusMismatch { status, has_doctor } => {
                if *has_doctor {
                    write!(f, "consultation in status `{status}` must not have a doctor")
                } else {
                    write!(f, "consultation in status `{status}` requires a doctor")
                }
            }
            Self::TimestampOrder { earlier, later } => {
                write!(f, "{later} must be >= {earlier}")
            }
            Self::SameParticipant => write!(f, "patient and doctor must be different users"),
        }
    }
}

impl Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

/// Strips separators from a phone number and checks the digit shape.
pub fn normalize_phone(raw: &str) -> Result<String, ValidationError> {
    let compact = PHONE_SEPARATORS_RE.replace_all(raw.trim(), "");
    if !PHONE_RE.is_match(&compact) {
        return Err(ValidationError::InvalidPhone);
    }
    Ok(compact.into_owned())
}

/// Trims and lowercases an email. Blank input normalizes to `None`.
pub fn normalize_email(raw: Option<&str>) -> Result<Option<String>, ValidationError> {
    let Some(value) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };
    let lowered = value.to_lowercase();
    if !EMAIL_RE.is_match(&lowered) {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(Some(lowered))
}

/// Parses `SYS/DIA` and returns both readings.
pub fn parse_blood_pressure(value: &str) -> Result<(u16, u16), ValidationError> {
    let invalid = || ValidationError::InvalidBloodPressure(value.to_string());
    let caps = BLOOD_PRESSURE_RE.captures(value.trim()).ok_or_else(invalid)?;
    let systolic: u16 = caps[1].parse().map_err(|_| invalid())?;
    let diastolic: u16 = caps[2].parse().map_err(|_| invalid())?;
    if systolic <= diastolic {
        return Err(invalid());
    }
    Ok((systolic, diastolic))
}

pub(crate) fn require_non_blank(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::BlankField(field));
    }
    Ok(())
}

pub(crate) fn require_non_nil(field: &'static str, id: &uuid::Uuid) -> ValidationResult {
    if id.is_nil() {
        return Err(ValidationError::NilId(field));
    }
    Ok(())
}

/// Checks an optional value against an inclusive range.
pub(crate) fn require_range(
    field: &'static str,
    value: Option<f64>,
    min: f64,
    max: f64,
) -> ValidationResult {
    match value {
        Some(value) if !(min..=max).contains(&value) => {
            Err(ValidationError::OutOfRange {
                field,
                value,
                min,
                max,
            })
        }
        _ => Ok(()),
    }
}

/// Checks that `later` is not before `earlier` when both are set.
pub(crate) fn require_order(
    earlier: (&'static str, Option<i64>),
    later: (&'static str, Option<i64>),
) -> ValidationResult {
    if let (Some(start), Some(end)) = (earlier.1, later.1) {
        if end < start {
            return Err(ValidationError::TimestampOrder {
                earlier: earlier.0,
                later: later.0,
            });
        }
    }
    Ok(())
}
