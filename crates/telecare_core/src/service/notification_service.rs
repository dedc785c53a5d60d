//! In-app notification service.
//!
//! # Responsibility
//! - Create call-request and call-reminder notifications for consultations.
//! - Expose inbox reads and read-state changes.
//!
//! # Invariants
//! - Recipients are always participants of the referenced consultation.
//! - Call requests go to the assigned doctor of a live consultation only.
//! - Ended consultations get no new notifications.

use crate::model::consultation::{Consultation, ConsultationStatus};
use crate::model::notification::{Notification, NotificationType};
use crate::model::EntityId;
use crate::repo::consultation_repo::ConsultationRepository;
use crate::repo::notification_repo::{NotificationListQuery, NotificationRepository};
use crate::service::{ServiceError, ServiceResult};
use log::info;

const CALL_REQUEST_TITLE: &str = "Video call request";
const CALL_REMINDER_TITLE: &str = "Video call reminder";

pub struct NotificationService<N: NotificationRepository, C: ConsultationRepository> {
    notifications: N,
    consultations: C,
}

impl<N: NotificationRepository, C: ConsultationRepository> NotificationService<N, C> {
    pub fn new(notifications: N, consultations: C) -> Self {
        Self {
            notifications,
            consultations,
        }
    }

    /// Asks the assigned doctor to join the call.
    ///
    /// # Errors
    /// - `ConsultationNotReady` unless the consultation is accepted or in
    ///   progress.
    pub fn notify_call_request(&self, consultation_id: EntityId) -> ServiceResult<Notification> {
        let consultation = self.load_consultation(consultation_id)?;
        let not_ready = ServiceError::ConsultationNotReady {
            consultation_id,
            status: consultation.status,
        };
        if !matches!(
            consultation.status,
            ConsultationStatus::Accepted | ConsultationStatus::InProgress
        ) {
            return Err(not_ready);
        }
        let doctor_id = consultation.doctor_id.ok_or(not_ready)?;

        let mut notification = Notification::new(
            doctor_id,
            consultation_id,
            NotificationType::VideoCallRequest,
            CALL_REQUEST_TITLE,
        );
        notification.action_required = true;
        self.store(notification)
    }

    /// Reminds one participant of an upcoming call.
    ///
    /// # Errors
    /// - `ConsultationNotReady` when the consultation already ended.
    /// - `NotParticipant` when `recipient_id` is neither patient nor doctor.
    pub fn notify_call_reminder(
        &self,
        consultation_id: EntityId,
        recipient_id: EntityId,
        content: Option<String>,
    ) -> ServiceResult<Notification> {
        let consultation = self.load_consultation(consultation_id)?;
        if consultation.status.is_terminal() {
            return Err(ServiceError::ConsultationNotReady {
                consultation_id,
                status: consultation.status,
            });
        }
        if !consultation.is_participant(recipient_id) {
            return Err(ServiceError::NotParticipant {
                user_id: recipient_id,
                consultation_id,
            });
        }

        let mut notification = Notification::new(
            recipient_id,
            consultation_id,
            NotificationType::VideoCallReminder,
            CALL_REMINDER_TITLE,
        );
        notification.content = content
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        self.store(notification)
    }

    pub fn mark_read(&self, id: EntityId) -> ServiceResult<()> {
        self.notifications.mark_read(id)?;
        Ok(())
    }

    /// Returns how many notifications changed state.
    pub fn mark_all_read(&self, recipient_id: EntityId) -> ServiceResult<usize> {
        let changed = self.notifications.mark_all_read(recipient_id)?;
        info!(
            "event=notification_mark_all_read module=service status=ok recipient_id={recipient_id} changed={changed}"
        );
        Ok(changed)
    }

    /// Recipient's notifications, newest first.
    pub fn inbox(
        &self,
        recipient_id: EntityId,
        query: &NotificationListQuery,
    ) -> ServiceResult<Vec<Notification>> {
        Ok(self.notifications.list_for_recipient(recipient_id, query)?)
    }

    pub fn unread_count(&self, recipient_id: EntityId) -> ServiceResult<i64> {
        Ok(self.notifications.unread_count(recipient_id)?)
    }

    fn load_consultation(&self, id: EntityId) -> ServiceResult<Consultation> {
        self.consultations
            .get_consultation(id)?
            .ok_or(ServiceError::NotFound {
                entity: "consultation",
                id,
            })
    }

    fn store(&self, notification: Notification) -> ServiceResult<Notification> {
        let id = self.notifications.create_notification(&notification)?;
        info!(
            "event=notification_create module=service status=ok notification_id={id} type={} consultation_id={}",
            notification.kind.as_str(),
            notification.consultation_id
        );
        self.notifications
            .get_notification(id)?
            .ok_or(ServiceError::InconsistentState(
                "created notification not found in read-back",
            ))
    }
}
