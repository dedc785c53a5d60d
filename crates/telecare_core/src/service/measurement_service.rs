//! Health measurement use-case service.
//!
//! Measurements are only recorded for active patient accounts; the
//! datastore trigger backs the role rule for writers outside this service.

use crate::model::measurement::HealthMeasurement;
use crate::model::user::UserRole;
use crate::model::EntityId;
use crate::repo::measurement_repo::{MeasurementRange, MeasurementRepository};
use crate::repo::user_repo::UserRepository;
use crate::service::{
    load_active_user, load_user, system_clock, Clock, ServiceError, ServiceResult,
};
use log::info;

/// Vital readings submitted by a patient. Absent fields were not measured.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasurementInput {
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub temperature_c: Option<f64>,
    pub spo2: Option<i64>,
    pub heart_rate: Option<i64>,
    pub blood_pressure: Option<String>,
    pub notes: Option<String>,
    /// Epoch milliseconds; defaults to the service clock.
    pub measured_at: Option<i64>,
}

pub struct MeasurementService<M: MeasurementRepository, U: UserRepository> {
    measurements: M,
    users: U,
    clock: Clock,
}

impl<M: MeasurementRepository, U: UserRepository> MeasurementService<M, U> {
    pub fn new(measurements: M, users: U) -> Self {
        Self::with_clock(measurements, users, system_clock)
    }

    pub fn with_clock(measurements: M, users: U, clock: Clock) -> Self {
        Self {
            measurements,
            users,
            clock,
        }
    }

    /// Validates and stores one reading for `patient_id`.
    ///
    /// # Errors
    /// - `RoleMismatch`/`InactiveUser` when the owner is not an active patient.
    /// - `Validation` when no vital is present or a value is out of range.
    pub fn record_measurement(
        &self,
        patient_id: EntityId,
        input: &MeasurementInput,
    ) -> ServiceResult<HealthMeasurement> {
        load_active_user(&self.users, patient_id, UserRole::Patient)?;

        let mut measurement =
            HealthMeasurement::new(patient_id, input.measured_at.unwrap_or_else(self.clock));
        measurement.height_cm = input.height_cm;
        measurement.weight_kg = input.weight_kg;
        measurement.temperature_c = input.temperature_c;
        measurement.spo2 = input.spo2;
        measurement.heart_rate = input.heart_rate;
        measurement.blood_pressure = trimmed(input.blood_pressure.as_deref());
        measurement.notes = trimmed(input.notes.as_deref());

        let id = self.measurements.create_measurement(&measurement)?;
        info!(
            "event=measurement_record module=service status=ok patient_id={patient_id} measurement_id={id}"
        );
        self.measurements
            .get_measurement(id)?
            .ok_or(ServiceError::InconsistentState(
                "recorded measurement not found in read-back",
            ))
    }

    /// Readings of one patient, newest first.
    pub fn measurement_history(
        &self,
        patient_id: EntityId,
        range: &MeasurementRange,
    ) -> ServiceResult<Vec<HealthMeasurement>> {
        let patient = load_user(&self.users, patient_id)?;
        if !patient.is_patient() {
            return Err(ServiceError::RoleMismatch {
                user_id: patient_id,
                expected: UserRole::Patient,
            });
        }
        Ok(self.measurements.list_for_patient(patient_id, range)?)
    }

    pub fn delete_measurement(&self, id: EntityId) -> ServiceResult<()> {
        self.measurements.delete_measurement(id)?;
        info!("event=measurement_delete module=service status=ok measurement_id={id}");
        Ok(())
    }
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
