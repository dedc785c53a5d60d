//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Enforce cross-entity rules (roles, participants, lifecycle) that a
//!   single record cannot check on its own.
//!
//! # Invariants
//! - Services never bypass repository validation/persistence contracts.
//! - Service logs carry ids and statuses only, never names, contact data,
//!   credentials or clinical text.

pub mod care_record_service;
pub mod consultation_service;
pub mod measurement_service;
pub mod notification_service;
pub mod stats_service;
pub mod user_service;

use crate::model::consultation::{ConsultationStatus, TransitionError};
use crate::model::user::{User, UserRole};
use crate::model::validation::ValidationError;
use crate::model::EntityId;
use crate::repo::user_repo::UserRepository;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Source of "now" in epoch milliseconds. Swappable for deterministic tests.
pub type Clock = fn() -> i64;

/// Wall-clock time in epoch milliseconds.
pub fn system_clock() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Use-case level failure.
#[derive(Debug)]
pub enum ServiceError {
    Validation(ValidationError),
    NotFound {
        entity: &'static str,
        id: EntityId,
    },
    /// User exists but does not hold the role the operation needs.
    RoleMismatch {
        user_id: EntityId,
        expected: UserRole,
    },
    /// User has been soft-deleted.
    InactiveUser(EntityId),
    InvalidTransition {
        from: ConsultationStatus,
        to: ConsultationStatus,
    },
    /// User is neither the patient nor the doctor of the consultation.
    NotParticipant {
        user_id: EntityId,
        consultation_id: EntityId,
    },
    /// Consultation has no doctor yet or is not in a status that allows the
    /// requested clinical record.
    ConsultationNotReady {
        consultation_id: EntityId,
        status: ConsultationStatus,
    },
    /// Write succeeded but read-back did not return the record.
    InconsistentState(&'static str),
    Repo(RepoError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::RoleMismatch { user_id, expected } => {
                write!(f, "user {user_id} is not a {expected}")
            }
            Self::InactiveUser(id) => write!(f, "user {id} is inactive"),
            Self::InvalidTransition { from, to } => {
                write!(f, "consultation cannot move from `{from}` to `{to}`")
            }
            Self::NotParticipant {
                user_id,
                consultation_id,
            } => write!(
                f,
                "user {user_id} is not a participant of consultation {consultation_id}"
            ),
            Self::ConsultationNotReady {
                consultation_id,
                status,
            } => write!(
                f,
                "consultation {consultation_id} in status `{status}` cannot carry clinical records"
            ),
            Self::InconsistentState(details) => write!(f, "inconsistent state: {details}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            other => Self::Repo(other),
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<TransitionError> for ServiceError {
    fn from(value: TransitionError) -> Self {
        Self::InvalidTransition {
            from: value.from,
            to: value.to,
        }
    }
}

/// Loads a user, or fails with `NotFound`.
pub(crate) fn load_user<U: UserRepository>(users: &U, id: EntityId) -> ServiceResult<User> {
    users
        .get_user(id)?
        .ok_or(ServiceError::NotFound { entity: "user", id })
}

/// Loads a user that is active and holds `role`.
pub(crate) fn load_active_user<U: UserRepository>(
    users: &U,
    id: EntityId,
    role: UserRole,
) -> ServiceResult<User> {
    let user = load_user(users, id)?;
    if user.role != role {
        return Err(ServiceError::RoleMismatch {
            user_id: id,
            expected: role,
        });
    }
    if !user.is_active {
        return Err(ServiceError::InactiveUser(id));
    }
    Ok(user)
}
