//! SQL helpers shared by the SQLite repositories.

use crate::db::migrations::{current_version, latest_version};
use crate::model::validation::ValidationError;
use crate::model::EntityId;
use crate::repo::{Page, RepoError, RepoResult};
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use uuid::Uuid;

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQL expression for the current time in epoch milliseconds.
pub(crate) const NOW_MS_SQL: &str = "(strftime('%s', 'now') * 1000)";

/// Verifies schema version and required tables before repository use.
pub(crate) fn ensure_connection_ready(conn: &Connection, tables: &[&'static str]) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in tables {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::MissingRequiredTable(*table));
        }
    }
    Ok(())
}

/// Appends `LIMIT/OFFSET` for `page` to `sql`.
pub(crate) fn push_page(sql: &mut String, bind_values: &mut Vec<Value>, page: Page) {
    if let Some(limit) = page.limit {
        sql.push_str(" LIMIT ?");
        bind_values.push(Value::Integer(i64::from(limit)));
        if page.offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(i64::from(page.offset)));
        }
    } else if page.offset > 0 {
        sql.push_str(" LIMIT -1 OFFSET ?");
        bind_values.push(Value::Integer(i64::from(page.offset)));
    }
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    i64::from(value)
}

pub(crate) fn get_bool(row: &Row<'_>, column: &'static str) -> RepoResult<bool> {
    match row.get::<_, i64>(column)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean `{other}` in column {column}"
        ))),
    }
}

pub(crate) fn get_id(row: &Row<'_>, column: &'static str) -> RepoResult<EntityId> {
    let text: String = row.get(column)?;
    parse_id(&text, column)
}

pub(crate) fn get_optional_id(row: &Row<'_>, column: &'static str) -> RepoResult<Option<EntityId>> {
    row.get::<_, Option<String>>(column)?
        .map(|text| parse_id(&text, column))
        .transpose()
}

pub(crate) fn get_optional_date(
    row: &Row<'_>,
    column: &'static str,
) -> RepoResult<Option<NaiveDate>> {
    row.get::<_, Option<String>>(column)?
        .map(|text| parse_date(&text, column))
        .transpose()
}

pub(crate) fn get_date(row: &Row<'_>, column: &'static str) -> RepoResult<NaiveDate> {
    let text: String = row.get(column)?;
    parse_date(&text, column)
}

pub(crate) fn date_to_db(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_id(text: &str, column: &'static str) -> RepoResult<EntityId> {
    Uuid::parse_str(text)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{text}` in {column}")))
}

fn parse_date(text: &str, column: &'static str) -> RepoResult<NaiveDate> {
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .map_err(|_| RepoError::InvalidData(format!("invalid date value `{text}` in {column}")))
}

/// Maps an unknown enum text to `InvalidData`.
pub(crate) fn invalid_enum(value: &str, column: &'static str) -> RepoError {
    RepoError::InvalidData(format!("invalid value `{value}` in {column}"))
}

/// Maps a stored row that fails record validation to `InvalidData`.
pub(crate) fn invalid_row(err: ValidationError) -> RepoError {
    RepoError::InvalidData(err.to_string())
}
