//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts per entity.
//! - Isolate SQLite query details from service/business orchestration.
//! - Translate datastore constraint failures into semantic errors.
//!
//! # Invariants
//! - Repository writes must call the record's `validate()` before SQL.
//! - Read paths re-validate persisted rows and surface corrupt state as
//!   `RepoError::InvalidData` instead of masking it.
//! - Repositories only accept connections migrated to the latest schema.

pub mod care_record_repo;
pub mod consultation_repo;
pub mod daily_stat_repo;
pub mod doctor_profile_repo;
pub mod error;
pub mod measurement_repo;
pub mod notification_repo;
mod support;
pub mod user_repo;

pub use error::{RepoError, RepoResult};

/// Pagination window shared by list queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    /// `None` returns every remaining row.
    pub limit: Option<u32>,
    pub offset: u32,
}

impl Page {
    pub fn first(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            offset: 0,
        }
    }
}
