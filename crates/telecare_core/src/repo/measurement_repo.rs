//! Health measurement repository contracts and SQLite implementation.
//!
//! Measurements have no soft-delete flag; removal is physical.

use crate::model::measurement::HealthMeasurement;
use crate::model::EntityId;
use crate::repo::support::{ensure_connection_ready, get_id, invalid_row, push_page};
use crate::repo::{Page, RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const MEASUREMENT_SELECT_SQL: &str = "SELECT
    id,
    patient_id,
    height_cm,
    weight_kg,
    temperature_c,
    spo2,
    heart_rate,
    blood_pressure,
    notes,
    measured_at,
    created_at
FROM health_measurements";

/// Time window over `measured_at`, both bounds inclusive.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeasurementRange {
    pub from: Option<i64>,
    pub to: Option<i64>,
    pub page: Page,
}

pub trait MeasurementRepository {
    fn create_measurement(&self, measurement: &HealthMeasurement) -> RepoResult<EntityId>;
    fn get_measurement(&self, id: EntityId) -> RepoResult<Option<HealthMeasurement>>;
    /// Newest first.
    fn list_for_patient(
        &self,
        patient_id: EntityId,
        range: &MeasurementRange,
    ) -> RepoResult<Vec<HealthMeasurement>>;
    fn delete_measurement(&self, id: EntityId) -> RepoResult<()>;
}

pub struct SqliteMeasurementRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMeasurementRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["users", "health_measurements"])?;
        Ok(Self { conn })
    }
}

impl MeasurementRepository for SqliteMeasurementRepository<'_> {
    fn create_measurement(&self, measurement: &HealthMeasurement) -> RepoResult<EntityId> {
        measurement.validate()?;

        self.conn.execute(
            "INSERT INTO health_measurements (
                id,
                patient_id,
                height_cm,
                weight_kg,
                temperature_c,
                spo2,
                heart_rate,
                blood_pressure,
                notes,
                measured_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                measurement.id.to_string(),
                measurement.patient_id.to_string(),
                measurement.height_cm,
                measurement.weight_kg,
                measurement.temperature_c,
                measurement.spo2,
                measurement.heart_rate,
                measurement.blood_pressure.as_deref(),
                measurement.notes.as_deref(),
                measurement.measured_at,
            ],
        )?;
        Ok(measurement.id)
    }

    fn get_measurement(&self, id: EntityId) -> RepoResult<Option<HealthMeasurement>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{MEASUREMENT_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_measurement_row(row)?));
        }
        Ok(None)
    }

    fn list_for_patient(
        &self,
        patient_id: EntityId,
        range: &MeasurementRange,
    ) -> RepoResult<Vec<HealthMeasurement>> {
        let mut sql = format!("{MEASUREMENT_SELECT_SQL} WHERE patient_id = ?");
        let mut bind_values = vec![Value::Text(patient_id.to_string())];

        if let Some(from) = range.from {
            sql.push_str(" AND measured_at >= ?");
            bind_values.push(Value::Integer(from));
        }
        if let Some(to) = range.to {
            sql.push_str(" AND measured_at <= ?");
            bind_values.push(Value::Integer(to));
        }

        sql.push_str(" ORDER BY measured_at DESC, id ASC");
        push_page(&mut sql, &mut bind_values, range.page);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut measurements = Vec::new();
        while let Some(row) = rows.next()? {
            measurements.push(parse_measurement_row(row)?);
        }
        Ok(measurements)
    }

    fn delete_measurement(&self, id: EntityId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM health_measurements WHERE id = ?1;",
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("health_measurement", id));
        }
        Ok(())
    }
}

fn parse_measurement_row(row: &Row<'_>) -> RepoResult<HealthMeasurement> {
    let measurement = HealthMeasurement {
        id: get_id(row, "id")?,
        patient_id: get_id(row, "patient_id")?,
        height_cm: row.get("height_cm")?,
        weight_kg: row.get("weight_kg")?,
        temperature_c: row.get("temperature_c")?,
        spo2: row.get("spo2")?,
        heart_rate: row.get("heart_rate")?,
        blood_pressure: row.get("blood_pressure")?,
        notes: row.get("notes")?,
        measured_at: row.get("measured_at")?,
        created_at: row.get("created_at")?,
    };
    measurement.validate().map_err(invalid_row)?;
    Ok(measurement)
}
