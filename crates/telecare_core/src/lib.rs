//! Core domain logic for TeleCare.
//! This crate is the single source of truth for account, consultation and
//! clinical-record invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::CoreConfig;
pub use db::{open_db, open_db_in_memory, table_row_counts, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::consultation::{Consultation, ConsultationStatus};
pub use model::user::{User, UserRole};
pub use model::validation::ValidationError;
pub use model::EntityId;
pub use repo::{Page, RepoError, RepoResult};
pub use service::{ServiceError, ServiceResult};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
