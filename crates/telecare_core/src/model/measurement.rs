//! Patient vital-sign measurement model.
//!
//! # Invariants
//! - Each measurement belongs to exactly one patient account.
//! - At least one vital sign or a non-blank note is present.
//! - Every present vital lies inside its plausible physiological range.

use crate::model::validation::{
    parse_blood_pressure, require_non_nil, require_range, ValidationError, ValidationResult,
};
use crate::model::EntityId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Inclusive plausibility ranges for stored vitals.
pub const HEIGHT_CM_RANGE: (f64, f64) = (20.0, 300.0);
pub const WEIGHT_KG_RANGE: (f64, f64) = (0.5, 700.0);
pub const TEMPERATURE_C_RANGE: (f64, f64) = (25.0, 45.0);
pub const SPO2_RANGE: (f64, f64) = (0.0, 100.0);
pub const HEART_RATE_RANGE: (f64, f64) = (20.0, 300.0);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthMeasurement {
    pub id: EntityId,
    pub patient_id: EntityId,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub temperature_c: Option<f64>,
    /// Oxygen saturation percent.
    pub spo2: Option<i64>,
    /// Beats per minute.
    pub heart_rate: Option<i64>,
    /// `SYS/DIA` in mmHg, e.g. `120/80`.
    pub blood_pressure: Option<String>,
    pub notes: Option<String>,
    /// Epoch milliseconds when the reading was taken.
    pub measured_at: i64,
    pub created_at: i64,
}

impl HealthMeasurement {
    /// Creates an empty measurement taken at `measured_at`.
    ///
    /// The caller fills vitals before persisting; an empty measurement fails
    /// validation.
    pub fn new(patient_id: EntityId, measured_at: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id,
            height_cm: None,
            weight_kg: None,
            temperature_c: None,
            spo2: None,
            heart_rate: None,
            blood_pressure: None,
            notes: None,
            measured_at,
            created_at: 0,
        }
    }

    pub fn has_content(&self) -> bool {
        self.height_cm.is_some()
            || self.weight_kg.is_some()
            || self.temperature_c.is_some()
            || self.spo2.is_some()
            || self.heart_rate.is_some()
            || self.blood_pressure.is_some()
            || self
                .notes
                .as_deref()
                .is_some_and(|notes| !notes.trim().is_empty())
    }

    pub fn validate(&self) -> ValidationResult {
        require_non_nil("measurement.id", &self.id)?;
        require_non_nil("measurement.patient_id", &self.patient_id)?;
        if !self.has_content() {
            return Err(ValidationError::EmptyMeasurement);
        }

        require_range(
            "measurement.height_cm",
            self.height_cm,
            HEIGHT_CM_RANGE.0,
            HEIGHT_CM_RANGE.1,
        )?;
        require_range(
            "measurement.weight_kg",
            self.weight_kg,
            WEIGHT_KG_RANGE.0,
            WEIGHT_KG_RANGE.1,
        )?;
        require_range(
            "measurement.temperature_c",
            self.temperature_c,
            TEMPERATURE_C_RANGE.0,
            TEMPERATURE_C_RANGE.1,
        )?;
        require_range(
            "measurement.spo2",
            self.spo2.map(|value| value as f64),
            SPO2_RANGE.0,
            SPO2_RANGE.1,
        )?;
        require_range(
            "measurement.heart_rate",
            self.heart_rate.map(|value| value as f64),
            HEART_RATE_RANGE.0,
            HEART_RATE_RANGE.1,
        )?;
        if let Some(value) = self.blood_pressure.as_deref() {
            parse_blood_pressure(value)?;
        }
        Ok(())
    }
}
