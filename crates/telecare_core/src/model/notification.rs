//! In-app notification records tied to a consultation.
//!
//! Delivery is handled outside core; this model only stores what should be
//! shown and whether it has been read.

use crate::model::validation::{require_non_blank, require_non_nil, ValidationResult};
use crate::model::EntityId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    VideoCallRequest,
    VideoCallReminder,
}

impl NotificationType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VideoCallRequest => "video_call_request",
            Self::VideoCallReminder => "video_call_reminder",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: EntityId,
    pub recipient_id: EntityId,
    pub consultation_id: EntityId,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub content: Option<String>,
    pub is_read: bool,
    /// Whether the recipient is expected to respond (accept/join).
    pub action_required: bool,
    pub created_at: i64,
}

impl Notification {
    pub fn new(
        recipient_id: EntityId,
        consultation_id: EntityId,
        kind: NotificationType,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient_id,
            consultation_id,
            kind,
            title: title.into(),
            content: None,
            is_read: false,
            action_required: false,
            created_at: 0,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        require_non_nil("notification.id", &self.id)?;
        require_non_nil("notification.recipient_id", &self.recipient_id)?;
        require_non_nil("notification.consultation_id", &self.consultation_id)?;
        require_non_blank("notification.title", &self.title)
    }
}
