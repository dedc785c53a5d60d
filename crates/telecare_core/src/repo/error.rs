//! Repository error type shared by every entity repository.

use crate::db::DbError;
use crate::model::validation::ValidationError;
use crate::model::EntityId;
use rusqlite::{ffi, ErrorCode};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Persistence error with datastore constraint failures already classified.
#[derive(Debug)]
pub enum RepoError {
    /// Record failed field-level validation before reaching SQL.
    Validation(ValidationError),
    /// Transport or bootstrap failure.
    Db(DbError),
    NotFound {
        entity: &'static str,
        id: EntityId,
    },
    /// UNIQUE violation. Holds the offending `table.column` list.
    Duplicate(String),
    /// Referenced row does not exist (FOREIGN KEY violation).
    MissingReference(String),
    /// CHECK/trigger violation or lost compare-and-set write.
    Conflict(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    /// Persisted data cannot be converted to a valid record.
    InvalidData(String),
}

impl RepoError {
    pub(crate) fn not_found(entity: &'static str, id: EntityId) -> Self {
        Self::NotFound { entity, id }
    }

    /// Returns whether this error is a UNIQUE violation on `column`
    /// (`table.column` form).
    pub fn is_duplicate_of(&self, column: &str) -> bool {
        matches!(self, Self::Duplicate(target) if target.split(", ").any(|part| part == column))
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Duplicate(target) => write!(f, "duplicate value for {target}"),
            Self::MissingReference(detail) => write!(f, "referenced record missing: {detail}"),
            Self::Conflict(detail) => write!(f, "write conflict: {detail}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, message) = &value {
            if failure.code == ErrorCode::ConstraintViolation {
                let detail = message.clone().unwrap_or_else(|| failure.to_string());
                return match failure.extended_code {
                    ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                        Self::Duplicate(constraint_target(&detail))
                    }
                    ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Self::MissingReference(detail),
                    _ => Self::Conflict(detail),
                };
            }
        }
        Self::Db(DbError::Sqlite(value))
    }
}

/// Extracts `table.column` from `UNIQUE constraint failed: table.column`.
fn constraint_target(detail: &str) -> String {
    detail
        .split_once(": ")
        .map_or(detail, |(_, target)| target)
        .trim()
        .to_string()
}
