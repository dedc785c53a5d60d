//! User repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD APIs over the `users` table.
//! - Implement soft delete by toggling `is_active`.
//!
//! # Invariants
//! - Write paths call `User::validate()` before SQL mutations.
//! - `get_user` returns inactive users too; only listing hides them.
//! - Doctor registration writes user and profile in one transaction.

use crate::model::doctor_profile::DoctorProfile;
use crate::model::user::{User, UserRole};
use crate::model::EntityId;
use crate::repo::doctor_profile_repo::insert_profile;
use crate::repo::support::{
    bool_to_int, ensure_connection_ready, get_bool, get_id, invalid_enum, invalid_row,
    push_page, NOW_MS_SQL,
};
use crate::repo::{Page, RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};

const USER_SELECT_SQL: &str = "SELECT
    id,
    role,
    name,
    phone,
    email,
    password_hash,
    is_active,
    last_active_at,
    created_at,
    updated_at
FROM users";

/// Query options for listing users.
#[derive(Debug, Clone, Default)]
pub struct UserListQuery {
    pub role: Option<UserRole>,
    pub include_inactive: bool,
    pub page: Page,
}

/// Repository interface for user accounts.
pub trait UserRepository {
    fn create_user(&self, user: &User) -> RepoResult<EntityId>;
    /// Inserts a doctor account and its profile atomically.
    fn create_doctor_with_profile(&self, user: &User, profile: &DoctorProfile) -> RepoResult<()>;
    fn get_user(&self, id: EntityId) -> RepoResult<Option<User>>;
    /// Looks up by normalized phone.
    fn find_by_phone(&self, phone: &str) -> RepoResult<Option<User>>;
    /// Looks up by normalized email.
    fn find_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    fn list_users(&self, query: &UserListQuery) -> RepoResult<Vec<User>>;
    /// Replaces mutable account fields. `is_active` is left untouched.
    fn update_user(&self, user: &User) -> RepoResult<()>;
    /// Soft-deletes (`false`) or restores (`true`) one account.
    fn set_active(&self, id: EntityId, active: bool) -> RepoResult<()>;
    fn touch_last_active(&self, id: EntityId, at: i64) -> RepoResult<()>;
}

/// SQLite-backed user repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["users", "doctor_profiles"])?;
        Ok(Self { conn })
    }

    fn find_one(&self, column: &'static str, value: &str) -> RepoResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} WHERE {column} = ?1;"))?;
        let mut rows = stmt.query([value])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_user_row(row)?));
        }
        Ok(None)
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, user: &User) -> RepoResult<EntityId> {
        insert_user(self.conn, user)?;
        Ok(user.id)
    }

    fn create_doctor_with_profile(&self, user: &User, profile: &DoctorProfile) -> RepoResult<()> {
        if user.role != UserRole::Doctor {
            return Err(RepoError::Conflict(
                "doctor_profile requires a doctor user".to_string(),
            ));
        }
        if profile.user_id != user.id {
            return Err(RepoError::Conflict(
                "doctor_profile.user_id must reference the new user".to_string(),
            ));
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        insert_user(&tx, user)?;
        insert_profile(&tx, profile)?;
        tx.commit()?;
        Ok(())
    }

    fn get_user(&self, id: EntityId) -> RepoResult<Option<User>> {
        self.find_one("id", &id.to_string())
    }

    fn find_by_phone(&self, phone: &str) -> RepoResult<Option<User>> {
        self.find_one("phone", phone)
    }

    fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        self.find_one("email", email)
    }

    fn list_users(&self, query: &UserListQuery) -> RepoResult<Vec<User>> {
        let mut sql = format!("{USER_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if !query.include_inactive {
            sql.push_str(" AND is_active = 1");
        }
        if let Some(role) = query.role {
            sql.push_str(" AND role = ?");
            bind_values.push(Value::Text(role.as_str().to_string()));
        }

        sql.push_str(" ORDER BY created_at DESC, id ASC");
        push_page(&mut sql, &mut bind_values, query.page);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            users.push(parse_user_row(row)?);
        }
        Ok(users)
    }

    fn update_user(&self, user: &User) -> RepoResult<()> {
        user.validate()?;

        let changed = self.conn.execute(
            &format!(
                "UPDATE users
                 SET
                    role = ?1,
                    name = ?2,
                    phone = ?3,
                    email = ?4,
                    password_hash = ?5,
                    updated_at = {NOW_MS_SQL}
                 WHERE id = ?6;"
            ),
            params![
                user.role.as_str(),
                user.name.as_str(),
                user.phone.as_str(),
                user.email.as_deref(),
                user.password_hash.as_str(),
                user.id.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::not_found("user", user.id));
        }
        Ok(())
    }

    fn set_active(&self, id: EntityId, active: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE users
                 SET
                    is_active = ?1,
                    updated_at = {NOW_MS_SQL}
                 WHERE id = ?2;"
            ),
            params![bool_to_int(active), id.to_string()],
        )?;

        if changed == 0 {
            return Err(RepoError::not_found("user", id));
        }
        Ok(())
    }

    fn touch_last_active(&self, id: EntityId, at: i64) -> RepoResult<()> {
        // Never move the marker backwards when events arrive out of order.
        let changed = self.conn.execute(
            "UPDATE users
             SET last_active_at = MAX(COALESCE(last_active_at, ?1), ?1)
             WHERE id = ?2;",
            params![at, id.to_string()],
        )?;

        if changed == 0 {
            return Err(RepoError::not_found("user", id));
        }
        Ok(())
    }
}

fn insert_user(conn: &Connection, user: &User) -> RepoResult<()> {
    user.validate()?;

    conn.execute(
        "INSERT INTO users (
            id,
            role,
            name,
            phone,
            email,
            password_hash,
            is_active,
            last_active_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
        params![
            user.id.to_string(),
            user.role.as_str(),
            user.name.as_str(),
            user.phone.as_str(),
            user.email.as_deref(),
            user.password_hash.as_str(),
            bool_to_int(user.is_active),
            user.last_active_at,
        ],
    )?;
    Ok(())
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    let role_text: String = row.get("role")?;
    let role = parse_role(&role_text).ok_or_else(|| invalid_enum(&role_text, "users.role"))?;

    let user = User {
        id: get_id(row, "id")?,
        role,
        name: row.get("name")?,
        phone: row.get("phone")?,
        email: row.get("email")?,
        password_hash: row.get("password_hash")?,
        is_active: get_bool(row, "is_active")?,
        last_active_at: row.get("last_active_at")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    user.validate().map_err(invalid_row)?;
    Ok(user)
}

fn parse_role(value: &str) -> Option<UserRole> {
    match value {
        "patient" => Some(UserRole::Patient),
        "doctor" => Some(UserRole::Doctor),
        _ => None,
    }
}
