//! Doctor profile repository contracts and SQLite implementation.
//!
//! # Invariants
//! - One profile per user (`UNIQUE(user_id)`), one owner per license.
//! - Storage rejects profiles whose user is not a doctor (trigger), so the
//!   rule holds even for writers that skip the service layer.

use crate::model::doctor_profile::DoctorProfile;
use crate::model::EntityId;
use crate::repo::support::{ensure_connection_ready, get_id, invalid_row, push_page, NOW_MS_SQL};
use crate::repo::{Page, RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const PROFILE_SELECT_SQL: &str = "SELECT
    id,
    user_id,
    license_number,
    specialty,
    rating,
    bio,
    created_at,
    updated_at
FROM doctor_profiles";

pub trait DoctorProfileRepository {
    fn create_profile(&self, profile: &DoctorProfile) -> RepoResult<EntityId>;
    fn get_profile(&self, id: EntityId) -> RepoResult<Option<DoctorProfile>>;
    fn get_profile_by_user(&self, user_id: EntityId) -> RepoResult<Option<DoctorProfile>>;
    fn find_by_license(&self, license_number: &str) -> RepoResult<Option<DoctorProfile>>;
    /// Case-insensitive specialty match over active doctors, best rated first.
    fn list_by_specialty(&self, specialty: &str, page: Page) -> RepoResult<Vec<DoctorProfile>>;
    /// Replaces license, specialty, rating and bio.
    fn update_profile(&self, profile: &DoctorProfile) -> RepoResult<()>;
}

pub struct SqliteDoctorProfileRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDoctorProfileRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["users", "doctor_profiles"])?;
        Ok(Self { conn })
    }

    fn find_one(&self, column: &'static str, value: &str) -> RepoResult<Option<DoctorProfile>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PROFILE_SELECT_SQL} WHERE {column} = ?1;"))?;
        let mut rows = stmt.query([value])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_profile_row(row)?));
        }
        Ok(None)
    }
}

impl DoctorProfileRepository for SqliteDoctorProfileRepository<'_> {
    fn create_profile(&self, profile: &DoctorProfile) -> RepoResult<EntityId> {
        insert_profile(self.conn, profile)?;
        Ok(profile.id)
    }

    fn get_profile(&self, id: EntityId) -> RepoResult<Option<DoctorProfile>> {
        self.find_one("id", &id.to_string())
    }

    fn get_profile_by_user(&self, user_id: EntityId) -> RepoResult<Option<DoctorProfile>> {
        self.find_one("user_id", &user_id.to_string())
    }

    fn find_by_license(&self, license_number: &str) -> RepoResult<Option<DoctorProfile>> {
        self.find_one("license_number", license_number.trim())
    }

    fn list_by_specialty(&self, specialty: &str, page: Page) -> RepoResult<Vec<DoctorProfile>> {
        let mut sql = format!(
            "{PROFILE_SELECT_SQL}
             WHERE specialty = ? COLLATE NOCASE
               AND user_id IN (SELECT id FROM users WHERE is_active = 1)
             ORDER BY rating IS NULL, rating DESC, license_number ASC"
        );
        let mut bind_values = vec![Value::Text(specialty.trim().to_string())];
        push_page(&mut sql, &mut bind_values, page);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut profiles = Vec::new();
        while let Some(row) = rows.next()? {
            profiles.push(parse_profile_row(row)?);
        }
        Ok(profiles)
    }

    fn update_profile(&self, profile: &DoctorProfile) -> RepoResult<()> {
        profile.validate()?;

        let changed = self.conn.execute(
            &format!(
                "UPDATE doctor_profiles
                 SET
                    license_number = ?1,
                    specialty = ?2,
                    rating = ?3,
                    bio = ?4,
                    updated_at = {NOW_MS_SQL}
                 WHERE id = ?5;"
            ),
            params![
                profile.license_number.as_str(),
                profile.specialty.as_str(),
                profile.rating,
                profile.bio.as_deref(),
                profile.id.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::not_found("doctor_profile", profile.id));
        }
        Ok(())
    }
}

pub(crate) fn insert_profile(conn: &Connection, profile: &DoctorProfile) -> RepoResult<()> {
    profile.validate()?;

    conn.execute(
        "INSERT INTO doctor_profiles (
            id,
            user_id,
            license_number,
            specialty,
            rating,
            bio
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
        params![
            profile.id.to_string(),
            profile.user_id.to_string(),
            profile.license_number.as_str(),
            profile.specialty.as_str(),
            profile.rating,
            profile.bio.as_deref(),
        ],
    )?;
    Ok(())
}

fn parse_profile_row(row: &Row<'_>) -> RepoResult<DoctorProfile> {
    let profile = DoctorProfile {
        id: get_id(row, "id")?,
        user_id: get_id(row, "user_id")?,
        license_number: row.get("license_number")?,
        specialty: row.get("specialty")?,
        rating: row.get("rating")?,
        bio: row.get("bio")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    profile.validate().map_err(invalid_row)?;
    Ok(profile)
}
