//! Consultation model and its lifecycle state machine.
//!
//! # Responsibility
//! - Define the patient/doctor session record.
//! - Own the only explicit state machine in the domain.
//!
//! # Invariants
//! - `doctor_id` is `None` while `status == Requested`.
//! - `Accepted`, `InProgress`, `Completed` and `Rejected` carry a doctor.
//! - `Cancelled` and `Failed` may or may not carry a doctor.
//! - Terminal statuses accept no further transitions.
//! - `requested_at <= accepted_at <= started_at <= ended_at` when set.
//!
//! Allowed transitions:
//!
//! ```text
//! requested -> accepted -> in_progress -> completed
//! requested -> rejected | cancelled | failed
//! accepted  -> cancelled | failed
//! in_progress -> failed
//! ```

use crate::model::validation::{
    require_non_blank, require_non_nil, require_order, ValidationError, ValidationResult,
};
use crate::model::EntityId;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationStatus {
    /// Patient asked for a call; no doctor assigned yet.
    Requested,
    /// A doctor took the request.
    Accepted,
    /// The call is running.
    InProgress,
    Completed,
    /// Declined by a doctor.
    Rejected,
    /// Withdrawn before the call finished.
    Cancelled,
    /// Call could not be established or dropped.
    Failed,
}

impl ConsultationStatus {
    pub const ALL: [ConsultationStatus; 7] = [
        Self::Requested,
        Self::Accepted,
        Self::InProgress,
        Self::Completed,
        Self::Rejected,
        Self::Cancelled,
        Self::Failed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Accepted => "accepted",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Rejected | Self::Cancelled | Self::Failed
        )
    }

    /// Returns whether `self -> next` is an edge of the lifecycle graph.
    pub fn can_transition_to(self, next: ConsultationStatus) -> bool {
        use ConsultationStatus::*;
        matches!(
            (self, next),
            (Requested, Accepted)
                | (Requested, Rejected)
                | (Requested, Cancelled)
                | (Requested, Failed)
                | (Accepted, InProgress)
                | (Accepted, Cancelled)
                | (Accepted, Failed)
                | (InProgress, Completed)
                | (InProgress, Failed)
        )
    }

    /// Doctor assignment rule for this status.
    ///
    /// `Some(true)`: doctor required. `Some(false)`: doctor forbidden.
    /// `None`: either is allowed.
    pub fn doctor_rule(self) -> Option<bool> {
        match self {
            Self::Requested => Some(false),
            Self::Accepted | Self::InProgress | Self::Completed | Self::Rejected => Some(true),
            Self::Cancelled | Self::Failed => None,
        }
    }
}

impl Display for ConsultationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected lifecycle edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionError {
    pub from: ConsultationStatus,
    pub to: ConsultationStatus,
}

impl Display for TransitionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "consultation cannot move from `{}` to `{}`",
            self.from, self.to
        )
    }
}

impl Error for TransitionError {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consultation {
    pub id: EntityId,
    pub patient_id: EntityId,
    pub doctor_id: Option<EntityId>,
    pub status: ConsultationStatus,
    pub requested_at: i64,
    pub accepted_at: Option<i64>,
    pub started_at: Option<i64>,
    pub ended_at: Option<i64>,
    /// External call-session identifier issued by the video provider.
    pub video_call_id: Option<String>,
    /// Whole seconds between `started_at` and `ended_at`.
    pub duration_secs: Option<i64>,
    pub rejection_reason: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Consultation {
    /// Creates a `Requested` consultation with no doctor.
    pub fn request(patient_id: EntityId, requested_at: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id,
            doctor_id: None,
            status: ConsultationStatus::Requested,
            requested_at,
            accepted_at: None,
            started_at: None,
            ended_at: None,
            video_call_id: None,
            duration_secs: None,
            rejection_reason: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        require_non_nil("consultation.id", &self.id)?;
        require_non_nil("consultation.patient_id", &self.patient_id)?;
        if let Some(doctor_id) = self.doctor_id.as_ref() {
            require_non_nil("consultation.doctor_id", doctor_id)?;
            if *doctor_id == self.patient_id {
                return Err(ValidationError::SameParticipant);
            }
        }

        let has_doctor = self.doctor_id.is_some();
        if let Some(required) = self.status.doctor_rule() {
            if required != has_doctor {
                return Err(ValidationError::DoctorStatusMismatch {
                    status: self.status,
                    has_doctor,
                });
            }
        }

        if let Some(video_call_id) = self.video_call_id.as_deref() {
            require_non_blank("consultation.video_call_id", video_call_id)?;
        }
        if let Some(duration) = self.duration_secs {
            if duration < 0 {
                return Err(ValidationError::OutOfRange {
                    field: "consultation.duration_secs",
                    value: duration as f64,
                    min: 0.0,
                    max: i64::MAX as f64,
                });
            }
        }

        let requested = ("consultation.requested_at", Some(self.requested_at));
        let accepted = ("consultation.accepted_at", self.accepted_at);
        let started = ("consultation.started_at", self.started_at);
        let ended = ("consultation.ended_at", self.ended_at);
        require_order(requested, accepted)?;
        require_order(requested, started)?;
        require_order(accepted, started)?;
        require_order(requested, ended)?;
        require_order(started, ended)?;
        Ok(())
    }

    /// Assigns `doctor_id` and moves to `Accepted`.
    pub fn accept(&mut self, doctor_id: EntityId, at: i64) -> Result<(), TransitionError> {
        self.transition(ConsultationStatus::Accepted)?;
        self.doctor_id = Some(doctor_id);
        self.accepted_at = Some(at);
        Ok(())
    }

    /// Moves to `InProgress`, attaching the call-session id when known.
    pub fn start(&mut self, video_call_id: Option<String>, at: i64) -> Result<(), TransitionError> {
        self.transition(ConsultationStatus::InProgress)?;
        self.started_at = Some(at);
        if video_call_id.is_some() {
            self.video_call_id = video_call_id;
        }
        Ok(())
    }

    /// Moves to `Completed` and computes `duration_secs`.
    pub fn complete(&mut self, at: i64) -> Result<(), TransitionError> {
        self.transition(ConsultationStatus::Completed)?;
        self.close(at);
        Ok(())
    }

    /// Records the declining doctor and reason, then moves to `Rejected`.
    pub fn reject(
        &mut self,
        doctor_id: EntityId,
        reason: Option<String>,
        at: i64,
    ) -> Result<(), TransitionError> {
        self.transition(ConsultationStatus::Rejected)?;
        self.doctor_id = Some(doctor_id);
        self.rejection_reason = reason;
        self.ended_at = Some(at);
        Ok(())
    }

    pub fn cancel(&mut self, at: i64) -> Result<(), TransitionError> {
        self.transition(ConsultationStatus::Cancelled)?;
        self.ended_at = Some(at);
        Ok(())
    }

    pub fn fail(&mut self, at: i64) -> Result<(), TransitionError> {
        self.transition(ConsultationStatus::Failed)?;
        self.close(at);
        Ok(())
    }

    /// Returns whether `user_id` is the patient or the assigned doctor.
    pub fn is_participant(&self, user_id: EntityId) -> bool {
        self.patient_id == user_id || self.doctor_id == Some(user_id)
    }

    fn transition(&mut self, next: ConsultationStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    fn close(&mut self, at: i64) {
        self.ended_at = Some(at);
        self.duration_secs = self
            .started_at
            .map(|started| (at - started).max(0) / 1000);
    }
}

#[cfg(test)]
mod tests {
    use super::{Consultation, ConsultationStatus, TransitionError};
    use crate::model::validation::ValidationError;
    use uuid::Uuid;

    #[test]
    fn happy_path_sets_timestamps_and_duration() {
        let doctor = Uuid::new_v4();
        let mut consultation = Consultation::request(Uuid::new_v4(), 1_000);
        consultation.accept(doctor, 2_000).unwrap();
        consultation.start(Some("room-42".to_string()), 3_000).unwrap();
        consultation.complete(63_500).unwrap();

        assert_eq!(consultation.status, ConsultationStatus::Completed);
        assert_eq!(consultation.doctor_id, Some(doctor));
        assert_eq!(consultation.video_call_id.as_deref(), Some("room-42"));
        assert_eq!(consultation.duration_secs, Some(60));
        assert!(consultation.validate().is_ok());
    }

    #[test]
    fn terminal_statuses_have_no_outgoing_edges() {
        for from in ConsultationStatus::ALL.into_iter().filter(|s| s.is_terminal()) {
            for to in ConsultationStatus::ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to} must be rejected");
            }
        }
    }

    #[test]
    fn cannot_start_before_accept() {
        let mut consultation = Consultation::request(Uuid::new_v4(), 1_000);
        let err = consultation.start(None, 2_000).unwrap_err();
        assert_eq!(
            err,
            TransitionError {
                from: ConsultationStatus::Requested,
                to: ConsultationStatus::InProgress,
            }
        );
        assert_eq!(consultation.status, ConsultationStatus::Requested);
    }

    #[test]
    fn requested_with_doctor_fails_validation() {
        let mut consultation = Consultation::request(Uuid::new_v4(), 1_000);
        consultation.doctor_id = Some(Uuid::new_v4());
        assert_eq!(
            consultation.validate(),
            Err(ValidationError::DoctorStatusMismatch {
                status: ConsultationStatus::Requested,
                has_doctor: true,
            })
        );
    }

    #[test]
    fn cancelled_without_doctor_is_valid() {
        let mut consultation = Consultation::request(Uuid::new_v4(), 1_000);
        consultation.cancel(1_500).unwrap();
        assert_eq!(consultation.doctor_id, None);
        assert!(consultation.validate().is_ok());
    }
}
