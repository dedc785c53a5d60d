//! Account use-case service.
//!
//! # Responsibility
//! - Register patients and doctors with normalized contact data.
//! - Attach doctor profiles and manage soft deletion.
//!
//! # Invariants
//! - A doctor registered here always has a profile; both rows are written
//!   in one transaction.
//! - Profiles are only attached to active doctor accounts.
//! - Deletion is soft: `is_active` flips, the row stays readable.

use crate::model::doctor_profile::DoctorProfile;
use crate::model::user::{User, UserRole};
use crate::model::EntityId;
use crate::repo::doctor_profile_repo::DoctorProfileRepository;
use crate::repo::user_repo::{UserListQuery, UserRepository};
use crate::repo::Page;
use crate::service::{
    load_active_user, load_user, system_clock, Clock, ServiceError, ServiceResult,
};
use log::info;

/// Account registration input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterUserRequest {
    pub name: String,
    /// Raw phone; normalized before storage.
    pub phone: String,
    pub email: Option<String>,
    /// Opaque credential produced by the auth layer.
    pub password_hash: String,
}

/// Doctor profile input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoctorProfileRequest {
    pub license_number: String,
    pub specialty: String,
    pub bio: Option<String>,
}

/// Account service facade over user and profile repositories.
pub struct UserService<U: UserRepository, P: DoctorProfileRepository> {
    users: U,
    profiles: P,
    clock: Clock,
}

impl<U: UserRepository, P: DoctorProfileRepository> UserService<U, P> {
    pub fn new(users: U, profiles: P) -> Self {
        Self::with_clock(users, profiles, system_clock)
    }

    pub fn with_clock(users: U, profiles: P, clock: Clock) -> Self {
        Self {
            users,
            profiles,
            clock,
        }
    }

    /// Registers an active patient account.
    ///
    /// # Errors
    /// - `Validation` for malformed phone/email or blank name/credential.
    /// - `Repo(Duplicate)` when phone or email is already taken.
    pub fn register_patient(&self, request: &RegisterUserRequest) -> ServiceResult<User> {
        let user = build_user(UserRole::Patient, request)?;
        self.users.create_user(&user)?;
        info!(
            "event=user_register module=service status=ok role={} user_id={}",
            user.role, user.id
        );
        self.read_back(user.id, "registered patient not found in read-back")
    }

    /// Registers a doctor account together with its profile.
    pub fn register_doctor(
        &self,
        request: &RegisterUserRequest,
        profile: &DoctorProfileRequest,
    ) -> ServiceResult<(User, DoctorProfile)> {
        let user = build_user(UserRole::Doctor, request)?;
        let profile = build_profile(user.id, profile);
        profile.validate()?;

        self.users.create_doctor_with_profile(&user, &profile)?;
        info!(
            "event=user_register module=service status=ok role={} user_id={}",
            user.role, user.id
        );

        let user = self.read_back(user.id, "registered doctor not found in read-back")?;
        let profile = self
            .profiles
            .get_profile_by_user(user.id)?
            .ok_or(ServiceError::InconsistentState(
                "doctor profile not found in read-back",
            ))?;
        Ok((user, profile))
    }

    /// Attaches a profile to an existing doctor account.
    ///
    /// # Errors
    /// - `RoleMismatch` when the user is a patient.
    /// - `InactiveUser` when the account was deleted.
    /// - `Repo(Duplicate)` when the user already has a profile or the
    ///   license is taken.
    pub fn create_doctor_profile(
        &self,
        user_id: EntityId,
        request: &DoctorProfileRequest,
    ) -> ServiceResult<DoctorProfile> {
        load_active_user(&self.users, user_id, UserRole::Doctor)?;
        let profile = build_profile(user_id, request);
        let profile_id = self.profiles.create_profile(&profile)?;
        info!(
            "event=doctor_profile_create module=service status=ok user_id={user_id} profile_id={profile_id}"
        );
        self.profiles
            .get_profile(profile_id)?
            .ok_or(ServiceError::InconsistentState(
                "doctor profile not found in read-back",
            ))
    }

    pub fn get_user(&self, id: EntityId) -> ServiceResult<User> {
        load_user(&self.users, id)
    }

    pub fn list_users(&self, query: &UserListQuery) -> ServiceResult<Vec<User>> {
        Ok(self.users.list_users(query)?)
    }

    /// Active doctors' profiles for one specialty, best rated first.
    pub fn doctors_by_specialty(
        &self,
        specialty: &str,
        page: Page,
    ) -> ServiceResult<Vec<DoctorProfile>> {
        Ok(self.profiles.list_by_specialty(specialty, page)?)
    }

    /// Replaces phone and email. `None` or blank email clears it.
    pub fn update_contact(
        &self,
        user_id: EntityId,
        phone: &str,
        email: Option<&str>,
    ) -> ServiceResult<User> {
        let mut user = load_user(&self.users, user_id)?;
        if !user.is_active {
            return Err(ServiceError::InactiveUser(user_id));
        }
        user.set_phone(phone)?;
        user.set_email(email)?;
        self.users.update_user(&user)?;
        info!("event=user_update_contact module=service status=ok user_id={user_id}");
        self.read_back(user_id, "updated user not found in read-back")
    }

    /// Soft-deletes one account.
    pub fn deactivate_user(&self, user_id: EntityId) -> ServiceResult<()> {
        self.users.set_active(user_id, false)?;
        info!("event=user_deactivate module=service status=ok user_id={user_id}");
        Ok(())
    }

    pub fn reactivate_user(&self, user_id: EntityId) -> ServiceResult<()> {
        self.users.set_active(user_id, true)?;
        info!("event=user_reactivate module=service status=ok user_id={user_id}");
        Ok(())
    }

    /// Stamps `last_active_at` with the service clock.
    pub fn record_activity(&self, user_id: EntityId) -> ServiceResult<()> {
        self.users.touch_last_active(user_id, (self.clock)())?;
        Ok(())
    }

    fn read_back(&self, id: EntityId, details: &'static str) -> ServiceResult<User> {
        self.users
            .get_user(id)?
            .ok_or(ServiceError::InconsistentState(details))
    }
}

fn build_user(role: UserRole, request: &RegisterUserRequest) -> ServiceResult<User> {
    let mut user = User::new(
        role,
        request.name.as_str(),
        &request.phone,
        request.password_hash.as_str(),
    )?;
    user.set_email(request.email.as_deref())?;
    Ok(user)
}

fn build_profile(user_id: EntityId, request: &DoctorProfileRequest) -> DoctorProfile {
    let mut profile = DoctorProfile::new(
        user_id,
        request.license_number.as_str(),
        request.specialty.as_str(),
    );
    profile.bio = request
        .bio
        .as_deref()
        .map(str::trim)
        .filter(|bio| !bio.is_empty())
        .map(str::to_string);
    profile
}
