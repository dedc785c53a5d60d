//! Per-day rollup of one doctor's consultation activity.
//!
//! # Invariants
//! - At most one row per `(doctor_id, stat_date)`.
//! - `unique_patients <= consultation_count`.
//! - Counters and revenue are never negative.

use crate::model::validation::{require_non_nil, require_range, ValidationError, ValidationResult};
use crate::model::EntityId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorDailyStat {
    pub id: EntityId,
    pub doctor_id: EntityId,
    /// UTC calendar day the aggregate covers.
    pub stat_date: NaiveDate,
    pub consultation_count: i64,
    pub unique_patients: i64,
    pub average_duration_secs: f64,
    /// Minor currency units.
    pub revenue_cents: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl DoctorDailyStat {
    /// Creates an empty aggregate for one doctor and day.
    pub fn empty(doctor_id: EntityId, stat_date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            doctor_id,
            stat_date,
            consultation_count: 0,
            unique_patients: 0,
            average_duration_secs: 0.0,
            revenue_cents: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        require_non_nil("daily_stat.id", &self.id)?;
        require_non_nil("daily_stat.doctor_id", &self.doctor_id)?;
        let count = self.consultation_count as f64;
        require_range("daily_stat.consultation_count", Some(count), 0.0, f64::MAX)?;
        require_range(
            "daily_stat.unique_patients",
            Some(self.unique_patients as f64),
            0.0,
            count,
        )?;
        require_range(
            "daily_stat.average_duration_secs",
            Some(self.average_duration_secs),
            0.0,
            f64::MAX,
        )?;
        if let Some(revenue) = self.revenue_cents {
            if revenue < 0 {
                return Err(ValidationError::OutOfRange {
                    field: "daily_stat.revenue_cents",
                    value: revenue as f64,
                    min: 0.0,
                    max: i64::MAX as f64,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::DoctorDailyStat;
    use chrono::NaiveDate;
    use uuid::Uuid;

    #[test]
    fn unique_patients_cannot_exceed_consultations() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let mut stat = DoctorDailyStat::empty(Uuid::new_v4(), date);
        assert!(stat.validate().is_ok());

        stat.consultation_count = 2;
        stat.unique_patients = 3;
        assert!(stat.validate().is_err());

        stat.unique_patients = 2;
        stat.revenue_cents = Some(-1);
        assert!(stat.validate().is_err());
    }
}
