//! Consultation lifecycle service.
//!
//! # Responsibility
//! - Open consultation requests for active patients.
//! - Drive the lifecycle: accept, start, complete, reject, cancel, fail.
//!
//! # Invariants
//! - Every transition is checked against the lifecycle graph before any
//!   write, then persisted with compare-and-set on the previous status.
//! - Lifecycle timestamps come from the injected clock.
//! - Only active doctors may accept or reject a request.

use crate::model::consultation::{Consultation, ConsultationStatus, TransitionError};
use crate::model::user::UserRole;
use crate::model::EntityId;
use crate::repo::consultation_repo::{ConsultationListQuery, ConsultationRepository};
use crate::repo::user_repo::UserRepository;
use crate::repo::{Page, RepoError};
use crate::service::{load_active_user, system_clock, Clock, ServiceError, ServiceResult};
use log::{info, warn};

pub struct ConsultationService<C: ConsultationRepository, U: UserRepository> {
    consultations: C,
    users: U,
    clock: Clock,
}

impl<C: ConsultationRepository, U: UserRepository> ConsultationService<C, U> {
    pub fn new(consultations: C, users: U) -> Self {
        Self::with_clock(consultations, users, system_clock)
    }

    pub fn with_clock(consultations: C, users: U, clock: Clock) -> Self {
        Self {
            consultations,
            users,
            clock,
        }
    }

    /// Opens a `requested` consultation with no doctor assigned.
    pub fn request_consultation(&self, patient_id: EntityId) -> ServiceResult<Consultation> {
        load_active_user(&self.users, patient_id, UserRole::Patient)?;
        let consultation = Consultation::request(patient_id, (self.clock)());
        let id = self.consultations.create_consultation(&consultation)?;
        info!(
            "event=consultation_request module=service status=ok consultation_id={id} patient_id={patient_id}"
        );
        self.get_consultation(id)
    }

    /// Assigns `doctor_id` and moves `requested -> accepted`.
    pub fn accept(&self, id: EntityId, doctor_id: EntityId) -> ServiceResult<Consultation> {
        load_active_user(&self.users, doctor_id, UserRole::Doctor)?;
        self.transition(id, |consultation, at| consultation.accept(doctor_id, at))
    }

    /// Moves `accepted -> in_progress`, recording the call-session id.
    pub fn start(&self, id: EntityId, video_call_id: Option<String>) -> ServiceResult<Consultation> {
        let video_call_id = video_call_id
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        self.transition(id, |consultation, at| consultation.start(video_call_id, at))
    }

    /// Moves `in_progress -> completed` and fixes the call duration.
    pub fn complete(&self, id: EntityId) -> ServiceResult<Consultation> {
        self.transition(id, |consultation, at| consultation.complete(at))
    }

    /// Declines a pending request on behalf of `doctor_id`.
    pub fn reject(
        &self,
        id: EntityId,
        doctor_id: EntityId,
        reason: Option<String>,
    ) -> ServiceResult<Consultation> {
        load_active_user(&self.users, doctor_id, UserRole::Doctor)?;
        let reason = reason
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        self.transition(id, |consultation, at| {
            consultation.reject(doctor_id, reason, at)
        })
    }

    pub fn cancel(&self, id: EntityId) -> ServiceResult<Consultation> {
        self.transition(id, |consultation, at| consultation.cancel(at))
    }

    /// Marks a consultation as failed, e.g. when the call could not connect.
    pub fn fail(&self, id: EntityId) -> ServiceResult<Consultation> {
        self.transition(id, |consultation, at| consultation.fail(at))
    }

    pub fn get_consultation(&self, id: EntityId) -> ServiceResult<Consultation> {
        self.consultations
            .get_consultation(id)?
            .ok_or(ServiceError::NotFound {
                entity: "consultation",
                id,
            })
    }

    /// Consultations of one patient, newest request first.
    pub fn list_for_patient(
        &self,
        patient_id: EntityId,
        page: Page,
    ) -> ServiceResult<Vec<Consultation>> {
        Ok(self.consultations.list_consultations(&ConsultationListQuery {
            patient_id: Some(patient_id),
            page,
            ..ConsultationListQuery::default()
        })?)
    }

    /// Consultations assigned to one doctor, optionally narrowed by status.
    pub fn list_for_doctor(
        &self,
        doctor_id: EntityId,
        status: Option<ConsultationStatus>,
        page: Page,
    ) -> ServiceResult<Vec<Consultation>> {
        Ok(self.consultations.list_consultations(&ConsultationListQuery {
            doctor_id: Some(doctor_id),
            status,
            page,
            ..ConsultationListQuery::default()
        })?)
    }

    /// Requests still waiting for a doctor.
    pub fn pending_requests(&self, page: Page) -> ServiceResult<Vec<Consultation>> {
        Ok(self.consultations.list_consultations(&ConsultationListQuery {
            status: Some(ConsultationStatus::Requested),
            page,
            ..ConsultationListQuery::default()
        })?)
    }

    fn transition<F>(&self, id: EntityId, apply: F) -> ServiceResult<Consultation>
    where
        F: FnOnce(&mut Consultation, i64) -> Result<(), TransitionError>,
    {
        let mut consultation = self.get_consultation(id)?;
        let expected = consultation.status;
        apply(&mut consultation, (self.clock)())?;

        match self.consultations.apply_transition(expected, &consultation) {
            Ok(()) => {}
            Err(err @ RepoError::Conflict(_)) => {
                warn!(
                    "event=consultation_transition module=service status=conflict consultation_id={id} from={expected} to={}",
                    consultation.status
                );
                return Err(err.into());
            }
            Err(err) => return Err(err.into()),
        }

        info!(
            "event=consultation_transition module=service status=ok consultation_id={id} from={expected} to={}",
            consultation.status
        );
        self.get_consultation(id)
    }
}
