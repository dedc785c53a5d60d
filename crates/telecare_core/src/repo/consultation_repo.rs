//! Consultation repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist consultation records and their lifecycle fields.
//! - Apply status transitions with compare-and-set semantics.
//!
//! # Invariants
//! - `apply_transition` only writes when the stored status still equals the
//!   caller's expected status; a concurrent writer makes it fail with
//!   `RepoError::Conflict` instead of silently overwriting.
//! - Storage enforces the doctor/status rule with a CHECK constraint.

use crate::model::consultation::{Consultation, ConsultationStatus};
use crate::model::EntityId;
use crate::repo::support::{
    ensure_connection_ready, get_id, get_optional_id, invalid_enum, invalid_row, push_page,
    NOW_MS_SQL,
};
use crate::repo::{Page, RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const CONSULTATION_SELECT_SQL: &str = "SELECT
    id,
    patient_id,
    doctor_id,
    status,
    requested_at,
    accepted_at,
    started_at,
    ended_at,
    video_call_id,
    duration_secs,
    rejection_reason,
    created_at,
    updated_at
FROM consultations";

/// Filter options for consultation listing. Empty filters match everything.
#[derive(Debug, Clone, Default)]
pub struct ConsultationListQuery {
    pub patient_id: Option<EntityId>,
    pub doctor_id: Option<EntityId>,
    pub status: Option<ConsultationStatus>,
    pub page: Page,
}

pub trait ConsultationRepository {
    fn create_consultation(&self, consultation: &Consultation) -> RepoResult<EntityId>;
    fn get_consultation(&self, id: EntityId) -> RepoResult<Option<Consultation>>;
    /// Newest request first.
    fn list_consultations(&self, query: &ConsultationListQuery) -> RepoResult<Vec<Consultation>>;
    /// Persists `next` only if the stored status equals `expected`.
    fn apply_transition(
        &self,
        expected: ConsultationStatus,
        next: &Consultation,
    ) -> RepoResult<()>;
}

pub struct SqliteConsultationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteConsultationRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["users", "consultations"])?;
        Ok(Self { conn })
    }
}

impl ConsultationRepository for SqliteConsultationRepository<'_> {
    fn create_consultation(&self, consultation: &Consultation) -> RepoResult<EntityId> {
        consultation.validate()?;

        self.conn.execute(
            "INSERT INTO consultations (
                id,
                patient_id,
                doctor_id,
                status,
                requested_at,
                accepted_at,
                started_at,
                ended_at,
                video_call_id,
                duration_secs,
                rejection_reason
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
            params![
                consultation.id.to_string(),
                consultation.patient_id.to_string(),
                consultation.doctor_id.map(|id| id.to_string()),
                consultation.status.as_str(),
                consultation.requested_at,
                consultation.accepted_at,
                consultation.started_at,
                consultation.ended_at,
                consultation.video_call_id.as_deref(),
                consultation.duration_secs,
                consultation.rejection_reason.as_deref(),
            ],
        )?;
        Ok(consultation.id)
    }

    fn get_consultation(&self, id: EntityId) -> RepoResult<Option<Consultation>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CONSULTATION_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_consultation_row(row)?));
        }
        Ok(None)
    }

    fn list_consultations(&self, query: &ConsultationListQuery) -> RepoResult<Vec<Consultation>> {
        let mut sql = format!("{CONSULTATION_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(patient_id) = query.patient_id {
            sql.push_str(" AND patient_id = ?");
            bind_values.push(Value::Text(patient_id.to_string()));
        }
        if let Some(doctor_id) = query.doctor_id {
            sql.push_str(" AND doctor_id = ?");
            bind_values.push(Value::Text(doctor_id.to_string()));
        }
        if let Some(status) = query.status {
            sql.push_str(" AND status = ?");
            bind_values.push(Value::Text(status.as_str().to_string()));
        }

        sql.push_str(" ORDER BY requested_at DESC, id ASC");
        push_page(&mut sql, &mut bind_values, query.page);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut consultations = Vec::new();
        while let Some(row) = rows.next()? {
            consultations.push(parse_consultation_row(row)?);
        }
        Ok(consultations)
    }

    fn apply_transition(
        &self,
        expected: ConsultationStatus,
        next: &Consultation,
    ) -> RepoResult<()> {
        next.validate()?;

        let changed = self.conn.execute(
            &format!(
                "UPDATE consultations
                 SET
                    doctor_id = ?1,
                    status = ?2,
                    accepted_at = ?3,
                    started_at = ?4,
                    ended_at = ?5,
                    video_call_id = ?6,
                    duration_secs = ?7,
                    rejection_reason = ?8,
                    updated_at = {NOW_MS_SQL}
                 WHERE id = ?9
                   AND status = ?10;"
            ),
            params![
                next.doctor_id.map(|id| id.to_string()),
                next.status.as_str(),
                next.accepted_at,
                next.started_at,
                next.ended_at,
                next.video_call_id.as_deref(),
                next.duration_secs,
                next.rejection_reason.as_deref(),
                next.id.to_string(),
                expected.as_str(),
            ],
        )?;

        if changed == 1 {
            return Ok(());
        }

        let stored: Option<String> = self
            .conn
            .query_row(
                "SELECT status FROM consultations WHERE id = ?1;",
                [next.id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        match stored {
            None => Err(RepoError::not_found("consultation", next.id)),
            Some(actual) => Err(RepoError::Conflict(format!(
                "consultation {} expected status `{expected}`, found `{actual}`",
                next.id
            ))),
        }
    }
}

fn parse_consultation_row(row: &Row<'_>) -> RepoResult<Consultation> {
    let status_text: String = row.get("status")?;
    let status = parse_status(&status_text)
        .ok_or_else(|| invalid_enum(&status_text, "consultations.status"))?;

    let consultation = Consultation {
        id: get_id(row, "id")?,
        patient_id: get_id(row, "patient_id")?,
        doctor_id: get_optional_id(row, "doctor_id")?,
        status,
        requested_at: row.get("requested_at")?,
        accepted_at: row.get("accepted_at")?,
        started_at: row.get("started_at")?,
        ended_at: row.get("ended_at")?,
        video_call_id: row.get("video_call_id")?,
        duration_secs: row.get("duration_secs")?,
        rejection_reason: row.get("rejection_reason")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    consultation.validate().map_err(invalid_row)?;
    Ok(consultation)
}

pub(crate) fn parse_status(value: &str) -> Option<ConsultationStatus> {
    ConsultationStatus::ALL
        .into_iter()
        .find(|status| status.as_str() == value)
}
