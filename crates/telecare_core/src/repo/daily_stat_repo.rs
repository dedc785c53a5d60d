//! Doctor daily statistics repository.
//!
//! # Responsibility
//! - Upsert one aggregate row per `(doctor_id, stat_date)`.
//! - Compute aggregates from completed consultations in SQL.
//!
//! # Invariants
//! - Upsert keeps the original row id and `created_at`.
//! - Day boundaries are UTC, derived from `consultations.ended_at`.

use crate::model::daily_stat::DoctorDailyStat;
use crate::model::EntityId;
use crate::repo::support::{
    date_to_db, ensure_connection_ready, get_date, get_id, invalid_row, NOW_MS_SQL,
};
use crate::repo::{RepoError, RepoResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};

const STAT_SELECT_SQL: &str = "SELECT
    id,
    doctor_id,
    stat_date,
    consultation_count,
    unique_patients,
    average_duration_secs,
    revenue_cents,
    created_at,
    updated_at
FROM doctor_daily_stats";

/// Aggregate of one doctor's completed consultations on one UTC day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyAggregate {
    pub consultation_count: i64,
    pub unique_patients: i64,
    pub average_duration_secs: f64,
}

pub trait DailyStatRepository {
    /// Inserts or replaces the counters of the `(doctor, date)` row.
    /// A `None` revenue keeps the stored value.
    fn upsert_stat(&self, stat: &DoctorDailyStat) -> RepoResult<DoctorDailyStat>;
    fn get_stat(&self, doctor_id: EntityId, date: NaiveDate)
        -> RepoResult<Option<DoctorDailyStat>>;
    /// Inclusive date range, oldest first.
    fn list_for_doctor(
        &self,
        doctor_id: EntityId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> RepoResult<Vec<DoctorDailyStat>>;
    fn aggregate_completed(&self, doctor_id: EntityId, date: NaiveDate)
        -> RepoResult<DailyAggregate>;
}

pub struct SqliteDailyStatRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDailyStatRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["consultations", "doctor_daily_stats"])?;
        Ok(Self { conn })
    }
}

impl DailyStatRepository for SqliteDailyStatRepository<'_> {
    fn upsert_stat(&self, stat: &DoctorDailyStat) -> RepoResult<DoctorDailyStat> {
        stat.validate()?;

        self.conn.execute(
            &format!(
                "INSERT INTO doctor_daily_stats (
                    id,
                    doctor_id,
                    stat_date,
                    consultation_count,
                    unique_patients,
                    average_duration_secs,
                    revenue_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT (doctor_id, stat_date) DO UPDATE SET
                    consultation_count = excluded.consultation_count,
                    unique_patients = excluded.unique_patients,
                    average_duration_secs = excluded.average_duration_secs,
                    revenue_cents = COALESCE(excluded.revenue_cents, doctor_daily_stats.revenue_cents),
                    updated_at = {NOW_MS_SQL};"
            ),
            params![
                stat.id.to_string(),
                stat.doctor_id.to_string(),
                date_to_db(stat.stat_date),
                stat.consultation_count,
                stat.unique_patients,
                stat.average_duration_secs,
                stat.revenue_cents,
            ],
        )?;

        self.get_stat(stat.doctor_id, stat.stat_date)?.ok_or_else(|| {
            RepoError::InvalidData(format!(
                "daily stat for doctor {} on {} missing after upsert",
                stat.doctor_id, stat.stat_date
            ))
        })
    }

    fn get_stat(
        &self,
        doctor_id: EntityId,
        date: NaiveDate,
    ) -> RepoResult<Option<DoctorDailyStat>> {
        let mut stmt = self.conn.prepare(&format!(
            "{STAT_SELECT_SQL} WHERE doctor_id = ?1 AND stat_date = ?2;"
        ))?;
        let mut rows = stmt.query(params![doctor_id.to_string(), date_to_db(date)])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_stat_row(row)?));
        }
        Ok(None)
    }

    fn list_for_doctor(
        &self,
        doctor_id: EntityId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> RepoResult<Vec<DoctorDailyStat>> {
        let mut stmt = self.conn.prepare(&format!(
            "{STAT_SELECT_SQL}
             WHERE doctor_id = ?1
               AND stat_date >= ?2
               AND stat_date <= ?3
             ORDER BY stat_date ASC;"
        ))?;
        let mut rows = stmt.query(params![
            doctor_id.to_string(),
            date_to_db(from),
            date_to_db(to)
        ])?;
        let mut stats = Vec::new();
        while let Some(row) = rows.next()? {
            stats.push(parse_stat_row(row)?);
        }
        Ok(stats)
    }

    fn aggregate_completed(
        &self,
        doctor_id: EntityId,
        date: NaiveDate,
    ) -> RepoResult<DailyAggregate> {
        let aggregate = self.conn.query_row(
            "SELECT
                COUNT(*),
                COUNT(DISTINCT patient_id),
                COALESCE(AVG(duration_secs), 0.0)
             FROM consultations
             WHERE doctor_id = ?1
               AND status = 'completed'
               AND ended_at IS NOT NULL
               AND date(ended_at / 1000, 'unixepoch') = ?2;",
            params![doctor_id.to_string(), date_to_db(date)],
            |row| {
                Ok(DailyAggregate {
                    consultation_count: row.get(0)?,
                    unique_patients: row.get(1)?,
                    average_duration_secs: row.get(2)?,
                })
            },
        )?;
        Ok(aggregate)
    }
}

fn parse_stat_row(row: &Row<'_>) -> RepoResult<DoctorDailyStat> {
    let stat = DoctorDailyStat {
        id: get_id(row, "id")?,
        doctor_id: get_id(row, "doctor_id")?,
        stat_date: get_date(row, "stat_date")?,
        consultation_count: row.get("consultation_count")?,
        unique_patients: row.get("unique_patients")?,
        average_duration_secs: row.get("average_duration_secs")?,
        revenue_cents: row.get("revenue_cents")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    stat.validate().map_err(invalid_row)?;
    Ok(stat)
}
