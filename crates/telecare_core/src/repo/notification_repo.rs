//! Notification repository contracts and SQLite implementation.

use crate::model::notification::{Notification, NotificationType};
use crate::model::EntityId;
use crate::repo::support::{
    bool_to_int, ensure_connection_ready, get_bool, get_id, invalid_enum, invalid_row,
    push_page,
};
use crate::repo::{Page, RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const NOTIFICATION_SELECT_SQL: &str = "SELECT
    id,
    recipient_id,
    consultation_id,
    type,
    title,
    content,
    is_read,
    action_required,
    created_at
FROM notifications";

#[derive(Debug, Clone, Default)]
pub struct NotificationListQuery {
    pub unread_only: bool,
    pub page: Page,
}

pub trait NotificationRepository {
    fn create_notification(&self, notification: &Notification) -> RepoResult<EntityId>;
    fn get_notification(&self, id: EntityId) -> RepoResult<Option<Notification>>;
    /// Newest first.
    fn list_for_recipient(
        &self,
        recipient_id: EntityId,
        query: &NotificationListQuery,
    ) -> RepoResult<Vec<Notification>>;
    fn mark_read(&self, id: EntityId) -> RepoResult<()>;
    /// Returns the number of notifications that flipped to read.
    fn mark_all_read(&self, recipient_id: EntityId) -> RepoResult<usize>;
    fn unread_count(&self, recipient_id: EntityId) -> RepoResult<i64>;
}

pub struct SqliteNotificationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNotificationRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["consultations", "notifications"])?;
        Ok(Self { conn })
    }
}

impl NotificationRepository for SqliteNotificationRepository<'_> {
    fn create_notification(&self, notification: &Notification) -> RepoResult<EntityId> {
        notification.validate()?;

        self.conn.execute(
            "INSERT INTO notifications (
                id,
                recipient_id,
                consultation_id,
                type,
                title,
                content,
                is_read,
                action_required
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                notification.id.to_string(),
                notification.recipient_id.to_string(),
                notification.consultation_id.to_string(),
                notification.kind.as_str(),
                notification.title.as_str(),
                notification.content.as_deref(),
                bool_to_int(notification.is_read),
                bool_to_int(notification.action_required),
            ],
        )?;
        Ok(notification.id)
    }

    fn get_notification(&self, id: EntityId) -> RepoResult<Option<Notification>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{NOTIFICATION_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_notification_row(row)?));
        }
        Ok(None)
    }

    fn list_for_recipient(
        &self,
        recipient_id: EntityId,
        query: &NotificationListQuery,
    ) -> RepoResult<Vec<Notification>> {
        let mut sql = format!("{NOTIFICATION_SELECT_SQL} WHERE recipient_id = ?");
        let mut bind_values = vec![Value::Text(recipient_id.to_string())];
        if query.unread_only {
            sql.push_str(" AND is_read = 0");
        }
        sql.push_str(" ORDER BY created_at DESC, rowid DESC");
        push_page(&mut sql, &mut bind_values, query.page);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut notifications = Vec::new();
        while let Some(row) = rows.next()? {
            notifications.push(parse_notification_row(row)?);
        }
        Ok(notifications)
    }

    fn mark_read(&self, id: EntityId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE notifications SET is_read = 1 WHERE id = ?1;",
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("notification", id));
        }
        Ok(())
    }

    fn mark_all_read(&self, recipient_id: EntityId) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "UPDATE notifications
             SET is_read = 1
             WHERE recipient_id = ?1
               AND is_read = 0;",
            [recipient_id.to_string()],
        )?;
        Ok(changed)
    }

    fn unread_count(&self, recipient_id: EntityId) -> RepoResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*)
             FROM notifications
             WHERE recipient_id = ?1
               AND is_read = 0;",
            [recipient_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn parse_notification_row(row: &Row<'_>) -> RepoResult<Notification> {
    let type_text: String = row.get("type")?;
    let kind = parse_notification_type(&type_text)
        .ok_or_else(|| invalid_enum(&type_text, "notifications.type"))?;

    let notification = Notification {
        id: get_id(row, "id")?,
        recipient_id: get_id(row, "recipient_id")?,
        consultation_id: get_id(row, "consultation_id")?,
        kind,
        title: row.get("title")?,
        content: row.get("content")?,
        is_read: get_bool(row, "is_read")?,
        action_required: get_bool(row, "action_required")?,
        created_at: row.get("created_at")?,
    };
    notification.validate().map_err(invalid_row)?;
    Ok(notification)
}

fn parse_notification_type(value: &str) -> Option<NotificationType> {
    match value {
        "video_call_request" => Some(NotificationType::VideoCallRequest),
        "video_call_reminder" => Some(NotificationType::VideoCallReminder),
        _ => None,
    }
}
