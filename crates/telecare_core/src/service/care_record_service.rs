//! Prescription and report use-case service.
//!
//! # Responsibility
//! - Issue prescriptions and file reports against a consultation.
//! - Keep patient/doctor ids consistent with the consultation they belong to.
//!
//! # Invariants
//! - Records are only written for consultations that have a doctor and are
//!   `in_progress` or `completed`.
//! - Only the consultation's doctor may issue or amend its records.
//! - Participant ids are copied from the consultation, never from input.

use crate::model::care_record::{Prescription, Report};
use crate::model::consultation::{Consultation, ConsultationStatus};
use crate::model::EntityId;
use crate::repo::care_record_repo::{PrescriptionRepository, ReportRepository};
use crate::repo::consultation_repo::ConsultationRepository;
use crate::service::{ServiceError, ServiceResult};
use chrono::NaiveDate;
use log::info;

/// Report content written by the doctor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportInput {
    pub diagnosis: String,
    pub notes: Option<String>,
    pub treatment_plan: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
}

pub struct CareRecordService<C, P, R>
where
    C: ConsultationRepository,
    P: PrescriptionRepository,
    R: ReportRepository,
{
    consultations: C,
    prescriptions: P,
    reports: R,
}

impl<C, P, R> CareRecordService<C, P, R>
where
    C: ConsultationRepository,
    P: PrescriptionRepository,
    R: ReportRepository,
{
    pub fn new(consultations: C, prescriptions: P, reports: R) -> Self {
        Self {
            consultations,
            prescriptions,
            reports,
        }
    }

    /// Issues one prescription from the consultation's doctor.
    ///
    /// # Errors
    /// - `ConsultationNotReady` when no doctor is assigned or the status is
    ///   not `in_progress`/`completed`.
    /// - `NotParticipant` when `doctor_id` is not the assigned doctor.
    pub fn issue_prescription(
        &self,
        consultation_id: EntityId,
        doctor_id: EntityId,
        content: &str,
    ) -> ServiceResult<Prescription> {
        let (consultation, doctor_id) = self.ready_consultation(consultation_id, doctor_id)?;
        let prescription = Prescription::new(
            consultation.id,
            consultation.patient_id,
            doctor_id,
            content.trim(),
        );
        let id = self.prescriptions.create_prescription(&prescription)?;
        info!(
            "event=prescription_issue module=service status=ok consultation_id={consultation_id} prescription_id={id}"
        );
        self.load_prescription(id)
    }

    /// Files one report from the consultation's doctor.
    pub fn file_report(
        &self,
        consultation_id: EntityId,
        doctor_id: EntityId,
        input: &ReportInput,
    ) -> ServiceResult<Report> {
        let (consultation, doctor_id) = self.ready_consultation(consultation_id, doctor_id)?;
        let mut report = Report::new(
            consultation.id,
            consultation.patient_id,
            doctor_id,
            input.diagnosis.trim(),
        );
        apply_report_input(&mut report, input);
        let id = self.reports.create_report(&report)?;
        info!(
            "event=report_file module=service status=ok consultation_id={consultation_id} report_id={id}"
        );
        self.load_report(id)
    }

    /// Marks a prescription as fulfilled. Repeating the call is a no-op.
    pub fn fulfil_prescription(&self, id: EntityId) -> ServiceResult<Prescription> {
        let prescription = self.load_prescription(id)?;
        if prescription.is_fulfilled {
            return Ok(prescription);
        }
        self.prescriptions.set_fulfilled(id, true)?;
        info!("event=prescription_fulfil module=service status=ok prescription_id={id}");
        self.load_prescription(id)
    }

    /// Replaces report content. Only the authoring doctor may amend it.
    pub fn update_report(
        &self,
        report_id: EntityId,
        doctor_id: EntityId,
        input: &ReportInput,
    ) -> ServiceResult<Report> {
        let mut report = self.load_report(report_id)?;
        if report.doctor_id != doctor_id {
            return Err(ServiceError::NotParticipant {
                user_id: doctor_id,
                consultation_id: report.consultation_id,
            });
        }
        report.diagnosis = input.diagnosis.trim().to_string();
        apply_report_input(&mut report, input);
        self.reports.update_report(&report)?;
        info!("event=report_update module=service status=ok report_id={report_id}");
        self.load_report(report_id)
    }

    pub fn prescriptions_for_patient(
        &self,
        patient_id: EntityId,
        include_fulfilled: bool,
    ) -> ServiceResult<Vec<Prescription>> {
        Ok(self
            .prescriptions
            .list_for_patient(patient_id, include_fulfilled)?)
    }

    pub fn reports_for_patient(&self, patient_id: EntityId) -> ServiceResult<Vec<Report>> {
        Ok(self.reports.list_for_patient(patient_id)?)
    }

    /// Prescriptions and reports attached to one consultation.
    pub fn records_for_consultation(
        &self,
        consultation_id: EntityId,
    ) -> ServiceResult<(Vec<Prescription>, Vec<Report>)> {
        Ok((
            self.prescriptions.list_for_consultation(consultation_id)?,
            self.reports.list_for_consultation(consultation_id)?,
        ))
    }

    fn ready_consultation(
        &self,
        consultation_id: EntityId,
        doctor_id: EntityId,
    ) -> ServiceResult<(Consultation, EntityId)> {
        let consultation = self
            .consultations
            .get_consultation(consultation_id)?
            .ok_or(ServiceError::NotFound {
                entity: "consultation",
                id: consultation_id,
            })?;

        let accepts_records = matches!(
            consultation.status,
            ConsultationStatus::InProgress | ConsultationStatus::Completed
        );
        let assigned = match consultation.doctor_id {
            Some(assigned) if accepts_records => assigned,
            _ => {
                return Err(ServiceError::ConsultationNotReady {
                    consultation_id,
                    status: consultation.status,
                })
            }
        };
        if assigned != doctor_id {
            return Err(ServiceError::NotParticipant {
                user_id: doctor_id,
                consultation_id,
            });
        }
        Ok((consultation, assigned))
    }

    fn load_prescription(&self, id: EntityId) -> ServiceResult<Prescription> {
        self.prescriptions
            .get_prescription(id)?
            .ok_or(ServiceError::NotFound {
                entity: "prescription",
                id,
            })
    }

    fn load_report(&self, id: EntityId) -> ServiceResult<Report> {
        self.reports.get_report(id)?.ok_or(ServiceError::NotFound {
            entity: "report",
            id,
        })
    }
}

fn apply_report_input(report: &mut Report, input: &ReportInput) {
    report.notes = non_blank(input.notes.as_deref());
    report.treatment_plan = non_blank(input.treatment_plan.as_deref());
    report.follow_up_date = input.follow_up_date;
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
