//! Doctor daily statistics service.
//!
//! Aggregates are recomputed from completed consultations and upserted,
//! so refreshing the same day twice leaves one row with current numbers.

use crate::model::daily_stat::DoctorDailyStat;
use crate::model::user::UserRole;
use crate::model::EntityId;
use crate::repo::daily_stat_repo::DailyStatRepository;
use crate::repo::user_repo::UserRepository;
use crate::service::{load_user, ServiceError, ServiceResult};
use chrono::NaiveDate;
use log::info;

pub struct StatsService<S: DailyStatRepository, U: UserRepository> {
    stats: S,
    users: U,
}

impl<S: DailyStatRepository, U: UserRepository> StatsService<S, U> {
    pub fn new(stats: S, users: U) -> Self {
        Self { stats, users }
    }

    /// Recomputes one doctor's aggregate for `date` (UTC) and stores it.
    ///
    /// `revenue_cents` is supplied by billing, which core does not track.
    /// `None` keeps the revenue already stored for that day.
    pub fn refresh_daily_stat(
        &self,
        doctor_id: EntityId,
        date: NaiveDate,
        revenue_cents: Option<i64>,
    ) -> ServiceResult<DoctorDailyStat> {
        self.require_doctor(doctor_id)?;

        let aggregate = self.stats.aggregate_completed(doctor_id, date)?;
        let mut stat = DoctorDailyStat::empty(doctor_id, date);
        stat.consultation_count = aggregate.consultation_count;
        stat.unique_patients = aggregate.unique_patients;
        stat.average_duration_secs = aggregate.average_duration_secs;
        stat.revenue_cents = revenue_cents;

        let stored = self.stats.upsert_stat(&stat)?;
        info!(
            "event=daily_stat_refresh module=service status=ok doctor_id={doctor_id} date={date} consultations={}",
            stored.consultation_count
        );
        Ok(stored)
    }

    /// Stored aggregates in `[from, to]`, oldest first.
    pub fn stats_between(
        &self,
        doctor_id: EntityId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ServiceResult<Vec<DoctorDailyStat>> {
        self.require_doctor(doctor_id)?;
        Ok(self.stats.list_for_doctor(doctor_id, from, to)?)
    }

    fn require_doctor(&self, doctor_id: EntityId) -> ServiceResult<()> {
        if !load_user(&self.users, doctor_id)?.is_doctor() {
            return Err(ServiceError::RoleMismatch {
                user_id: doctor_id,
                expected: UserRole::Doctor,
            });
        }
        Ok(())
    }
}
