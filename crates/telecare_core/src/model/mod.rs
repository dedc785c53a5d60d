//! Telehealth domain model.
//!
//! # Responsibility
//! - Define canonical records for accounts, consultations and their outputs.
//! - Keep field-level invariants next to the data (`validate()`).
//!
//! # Invariants
//! - Every record is identified by a generated v4 `EntityId`.
//! - Users are soft-deleted through `is_active`, never removed.
//! - Timestamps are Unix epoch milliseconds.

pub mod care_record;
pub mod consultation;
pub mod daily_stat;
pub mod doctor_profile;
pub mod measurement;
pub mod notification;
pub mod user;
pub mod validation;

/// Stable identifier shared by every persisted record.
pub type EntityId = uuid::Uuid;
