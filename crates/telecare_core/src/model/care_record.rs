//! Clinical outputs of a consultation: prescriptions and reports.
//!
//! # Invariants
//! - Both records reference one consultation and copy its patient/doctor.
//! - Patient and doctor are different users.

use crate::model::validation::{
    require_non_blank, require_non_nil, ValidationError, ValidationResult,
};
use crate::model::EntityId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prescription {
    pub id: EntityId,
    pub consultation_id: EntityId,
    pub patient_id: EntityId,
    pub doctor_id: EntityId,
    /// Free-text medication instructions.
    pub content: String,
    pub is_fulfilled: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Prescription {
    pub fn new(
        consultation_id: EntityId,
        patient_id: EntityId,
        doctor_id: EntityId,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            consultation_id,
            patient_id,
            doctor_id,
            content: content.into(),
            is_fulfilled: false,
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        require_non_nil("prescription.id", &self.id)?;
        validate_participants(
            PRESCRIPTION_FIELDS,
            self.consultation_id,
            self.patient_id,
            self.doctor_id,
        )?;
        require_non_blank("prescription.content", &self.content)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub id: EntityId,
    pub consultation_id: EntityId,
    pub patient_id: EntityId,
    pub doctor_id: EntityId,
    pub diagnosis: String,
    pub notes: Option<String>,
    pub treatment_plan: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Report {
    pub fn new(
        consultation_id: EntityId,
        patient_id: EntityId,
        doctor_id: EntityId,
        diagnosis: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            consultation_id,
            patient_id,
            doctor_id,
            diagnosis: diagnosis.into(),
            notes: None,
            treatment_plan: None,
            follow_up_date: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        require_non_nil("report.id", &self.id)?;
        validate_participants(
            REPORT_FIELDS,
            self.consultation_id,
            self.patient_id,
            self.doctor_id,
        )?;
        require_non_blank("report.diagnosis", &self.diagnosis)
    }
}

/// Field names for `(consultation_id, patient_id, doctor_id)`.
type ParticipantFields = [&'static str; 3];

const PRESCRIPTION_FIELDS: ParticipantFields = [
    "prescription.consultation_id",
    "prescription.patient_id",
    "prescription.doctor_id",
];
const REPORT_FIELDS: ParticipantFields = [
    "report.consultation_id",
    "report.patient_id",
    "report.doctor_id",
];

fn validate_participants(
    fields: ParticipantFields,
    consultation_id: EntityId,
    patient_id: EntityId,
    doctor_id: EntityId,
) -> ValidationResult {
    require_non_nil(fields[0], &consultation_id)?;
    require_non_nil(fields[1], &patient_id)?;
    require_non_nil(fields[2], &doctor_id)?;
    if patient_id == doctor_id {
        return Err(ValidationError::SameParticipant);
    }
    Ok(())
}
