//! Prescription and report repositories.
//!
//! # Invariants
//! - Inserts are rejected by storage when patient/doctor do not match the
//!   referenced consultation (trigger) or the consultation is missing (FK).
//! - Participant columns are immutable after insert.

use crate::model::care_record::{Prescription, Report};
use crate::model::EntityId;
use crate::repo::support::{
    bool_to_int, date_to_db, ensure_connection_ready, get_bool, get_id, get_optional_date,
    invalid_row, NOW_MS_SQL,
};
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

const PRESCRIPTION_SELECT_SQL: &str = "SELECT
    id,
    consultation_id,
    patient_id,
    doctor_id,
    content,
    is_fulfilled,
    created_at,
    updated_at
FROM prescriptions";

const REPORT_SELECT_SQL: &str = "SELECT
    id,
    consultation_id,
    patient_id,
    doctor_id,
    diagnosis,
    notes,
    treatment_plan,
    follow_up_date,
    created_at,
    updated_at
FROM reports";

pub trait PrescriptionRepository {
    fn create_prescription(&self, prescription: &Prescription) -> RepoResult<EntityId>;
    fn get_prescription(&self, id: EntityId) -> RepoResult<Option<Prescription>>;
    fn list_for_consultation(&self, consultation_id: EntityId) -> RepoResult<Vec<Prescription>>;
    fn list_for_patient(
        &self,
        patient_id: EntityId,
        include_fulfilled: bool,
    ) -> RepoResult<Vec<Prescription>>;
    fn set_fulfilled(&self, id: EntityId, fulfilled: bool) -> RepoResult<()>;
}

pub trait ReportRepository {
    fn create_report(&self, report: &Report) -> RepoResult<EntityId>;
    fn get_report(&self, id: EntityId) -> RepoResult<Option<Report>>;
    fn list_for_consultation(&self, consultation_id: EntityId) -> RepoResult<Vec<Report>>;
    /// Newest first.
    fn list_for_patient(&self, patient_id: EntityId) -> RepoResult<Vec<Report>>;
    /// Replaces diagnosis, notes, treatment plan and follow-up date.
    fn update_report(&self, report: &Report) -> RepoResult<()>;
}

pub struct SqlitePrescriptionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePrescriptionRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["consultations", "prescriptions"])?;
        Ok(Self { conn })
    }

    fn query(&self, filter: &str, value: String) -> RepoResult<Vec<Prescription>> {
        let mut stmt = self.conn.prepare(&format!(
            "{PRESCRIPTION_SELECT_SQL} WHERE {filter} ORDER BY created_at ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([value])?;
        let mut prescriptions = Vec::new();
        while let Some(row) = rows.next()? {
            prescriptions.push(parse_prescription_row(row)?);
        }
        Ok(prescriptions)
    }
}

impl PrescriptionRepository for SqlitePrescriptionRepository<'_> {
    fn create_prescription(&self, prescription: &Prescription) -> RepoResult<EntityId> {
        prescription.validate()?;

        self.conn.execute(
            "INSERT INTO prescriptions (
                id,
                consultation_id,
                patient_id,
                doctor_id,
                content,
                is_fulfilled
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                prescription.id.to_string(),
                prescription.consultation_id.to_string(),
                prescription.patient_id.to_string(),
                prescription.doctor_id.to_string(),
                prescription.content.as_str(),
                bool_to_int(prescription.is_fulfilled),
            ],
        )?;
        Ok(prescription.id)
    }

    fn get_prescription(&self, id: EntityId) -> RepoResult<Option<Prescription>> {
        Ok(self.query("id = ?1", id.to_string())?.into_iter().next())
    }

    fn list_for_consultation(&self, consultation_id: EntityId) -> RepoResult<Vec<Prescription>> {
        self.query("consultation_id = ?1", consultation_id.to_string())
    }

    fn list_for_patient(
        &self,
        patient_id: EntityId,
        include_fulfilled: bool,
    ) -> RepoResult<Vec<Prescription>> {
        let filter = if include_fulfilled {
            "patient_id = ?1"
        } else {
            "patient_id = ?1 AND is_fulfilled = 0"
        };
        self.query(filter, patient_id.to_string())
    }

    fn set_fulfilled(&self, id: EntityId, fulfilled: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE prescriptions
                 SET
                    is_fulfilled = ?1,
                    updated_at = {NOW_MS_SQL}
                 WHERE id = ?2;"
            ),
            params![bool_to_int(fulfilled), id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("prescription", id));
        }
        Ok(())
    }
}

pub struct SqliteReportRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteReportRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["consultations", "reports"])?;
        Ok(Self { conn })
    }

    fn query(&self, filter: &str, order: &str, value: String) -> RepoResult<Vec<Report>> {
        let mut stmt = self.conn.prepare(&format!(
            "{REPORT_SELECT_SQL} WHERE {filter} ORDER BY {order};"
        ))?;
        let mut rows = stmt.query([value])?;
        let mut reports = Vec::new();
        while let Some(row) = rows.next()? {
            reports.push(parse_report_row(row)?);
        }
        Ok(reports)
    }
}

impl ReportRepository for SqliteReportRepository<'_> {
    fn create_report(&self, report: &Report) -> RepoResult<EntityId> {
        report.validate()?;

        self.conn.execute(
            "INSERT INTO reports (
                id,
                consultation_id,
                patient_id,
                doctor_id,
                diagnosis,
                notes,
                treatment_plan,
                follow_up_date
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                report.id.to_string(),
                report.consultation_id.to_string(),
                report.patient_id.to_string(),
                report.doctor_id.to_string(),
                report.diagnosis.as_str(),
                report.notes.as_deref(),
                report.treatment_plan.as_deref(),
                report.follow_up_date.map(date_to_db),
            ],
        )?;
        Ok(report.id)
    }

    fn get_report(&self, id: EntityId) -> RepoResult<Option<Report>> {
        Ok(self
            .query("id = ?1", "id ASC", id.to_string())?
            .into_iter()
            .next())
    }

    fn list_for_consultation(&self, consultation_id: EntityId) -> RepoResult<Vec<Report>> {
        self.query(
            "consultation_id = ?1",
            "created_at ASC, id ASC",
            consultation_id.to_string(),
        )
    }

    fn list_for_patient(&self, patient_id: EntityId) -> RepoResult<Vec<Report>> {
        self.query(
            "patient_id = ?1",
            "created_at DESC, id ASC",
            patient_id.to_string(),
        )
    }

    fn update_report(&self, report: &Report) -> RepoResult<()> {
        report.validate()?;

        let changed = self.conn.execute(
            &format!(
                "UPDATE reports
                 SET
                    diagnosis = ?1,
                    notes = ?2,
                    treatment_plan = ?3,
                    follow_up_date = ?4,
                    updated_at = {NOW_MS_SQL}
                 WHERE id = ?5;"
            ),
            params![
                report.diagnosis.as_str(),
                report.notes.as_deref(),
                report.treatment_plan.as_deref(),
                report.follow_up_date.map(date_to_db),
                report.id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("report", report.id));
        }
        Ok(())
    }
}

fn parse_prescription_row(row: &Row<'_>) -> RepoResult<Prescription> {
    let prescription = Prescription {
        id: get_id(row, "id")?,
        consultation_id: get_id(row, "consultation_id")?,
        patient_id: get_id(row, "patient_id")?,
        doctor_id: get_id(row, "doctor_id")?,
        content: row.get("content")?,
        is_fulfilled: get_bool(row, "is_fulfilled")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    prescription.validate().map_err(invalid_row)?;
    Ok(prescription)
}

fn parse_report_row(row: &Row<'_>) -> RepoResult<Report> {
    let report = Report {
        id: get_id(row, "id")?,
        consultation_id: get_id(row, "consultation_id")?,
        patient_id: get_id(row, "patient_id")?,
        doctor_id: get_id(row, "doctor_id")?,
        diagnosis: row.get("diagnosis")?,
        notes: row.get("notes")?,
        treatment_plan: row.get("treatment_plan")?,
        follow_up_date: get_optional_date(row, "follow_up_date")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    report.validate().map_err(invalid_row)?;
    Ok(report)
}
