//! Professional profile attached to a doctor account.
//!
//! # Invariants
//! - Exactly zero or one profile exists per user, and only for doctors.
//! - `license_number` is trimmed and unique across profiles.
//! - `rating`, when set, lies in `[0, 5]`.

use crate::model::validation::{require_non_blank, require_non_nil, require_range, ValidationResult};
use crate::model::EntityId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const RATING_MIN: f64 = 0.0;
pub const RATING_MAX: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorProfile {
    pub id: EntityId,
    /// Owning doctor account.
    pub user_id: EntityId,
    pub license_number: String,
    pub specialty: String,
    pub rating: Option<f64>,
    pub bio: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl DoctorProfile {
    pub fn new(
        user_id: EntityId,
        license_number: impl Into<String>,
        specialty: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            license_number: license_number.into().trim().to_string(),
            specialty: specialty.into().trim().to_string(),
            rating: None,
            bio: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        require_non_nil("doctor_profile.id", &self.id)?;
        require_non_nil("doctor_profile.user_id", &self.user_id)?;
        require_non_blank("doctor_profile.license_number", &self.license_number)?;
        require_non_blank("doctor_profile.specialty", &self.specialty)?;
        require_range("doctor_profile.rating", self.rating, RATING_MIN, RATING_MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::DoctorProfile;
    use crate::model::validation::ValidationError;
    use uuid::Uuid;

    #[test]
    fn rating_outside_range_is_rejected() {
        let mut profile = DoctorProfile::new(Uuid::new_v4(), " LIC-1 ", "cardiology");
        assert_eq!(profile.license_number, "LIC-1");
        profile.rating = Some(5.5);
        assert!(matches!(
            profile.validate(),
            Err(ValidationError::OutOfRange {
                field: "doctor_profile.rating",
                ..
            })
        ));
        profile.rating = Some(4.8);
        assert!(profile.validate().is_ok());
    }
}
