use chrono::NaiveDate;
use rusqlite::Connection;
use telecare_core::db::open_db_in_memory;
use telecare_core::repo::consultation_repo::{ConsultationRepository, SqliteConsultationRepository};
use telecare_core::repo::daily_stat_repo::{DailyStatRepository, SqliteDailyStatRepository};
use telecare_core::repo::user_repo::{SqliteUserRepository, UserRepository};
use telecare_core::service::stats_service::StatsService;
use telecare_core::{Consultation, EntityId, ServiceError, User, UserRole};

/// 2023-11-14T00:00:00Z
const DAY_START_MS: i64 = 1_699_920_000_000;
const HOUR_MS: i64 = 3_600_000;

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 11, 14).unwrap()
}

fn next_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 11, 15).unwrap()
}

fn create_user(conn: &Connection, role: UserRole, phone: &str) -> EntityId {
    let repo = SqliteUserRepository::try_new(conn).unwrap();
    let user = User::new(role, "Test User", phone, "hash").unwrap();
    repo.create_user(&user).unwrap()
}

fn stats(conn: &Connection) -> StatsService<SqliteDailyStatRepository<'_>, SqliteUserRepository<'_>> {
    StatsService::new(
        SqliteDailyStatRepository::try_new(conn).unwrap(),
        SqliteUserRepository::try_new(conn).unwrap(),
    )
}

/// Stores a call that started at `started_at` and lasted `duration_secs`.
fn store_call(
    conn: &Connection,
    patient: EntityId,
    doctor: EntityId,
    started_at: i64,
    duration_secs: i64,
    completed: bool,
) {
    let repo = SqliteConsultationRepository::try_new(conn).unwrap();
    let mut consultation = Consultation::request(patient, started_at - 60_000);
    consultation.accept(doctor, started_at - 30_000).unwrap();
    consultation.start(None, started_at).unwrap();
    let ended_at = started_at + duration_secs * 1000;
    if completed {
        consultation.complete(ended_at).unwrap();
    } else {
        consultation.fail(ended_at).unwrap();
    }
    repo.create_consultation(&consultation).unwrap();
}

#[test]
fn aggregate_counts_only_completed_calls_ending_that_day() {
    let conn = open_db_in_memory().unwrap();
    let alice = create_user(&conn, UserRole::Patient, "+15550400001");
    let bob = create_user(&conn, UserRole::Patient, "+15550400002");
    let doctor = create_user(&conn, UserRole::Doctor, "+15550400003");
    let colleague = create_user(&conn, UserRole::Doctor, "+15550400004");

    store_call(&conn, alice, doctor, DAY_START_MS + 10 * HOUR_MS, 600, true);
    store_call(&conn, alice, doctor, DAY_START_MS + 12 * HOUR_MS, 1200, true);
    store_call(&conn, bob, doctor, DAY_START_MS + 15 * HOUR_MS, 300, true);
    // Failed call, another doctor's call and a call ending after midnight.
    store_call(&conn, bob, doctor, DAY_START_MS + 16 * HOUR_MS, 900, false);
    store_call(&conn, bob, colleague, DAY_START_MS + 9 * HOUR_MS, 900, true);
    store_call(&conn, bob, doctor, DAY_START_MS + 24 * HOUR_MS - 60_000, 120, true);

    let repo = SqliteDailyStatRepository::try_new(&conn).unwrap();
    let aggregate = repo.aggregate_completed(doctor, day()).unwrap();
    assert_eq!(aggregate.consultation_count, 3);
    assert_eq!(aggregate.unique_patients, 2);
    assert!((aggregate.average_duration_secs - 700.0).abs() < f64::EPSILON);

    let following = repo.aggregate_completed(doctor, next_day()).unwrap();
    assert_eq!(following.consultation_count, 1);
    assert!((following.average_duration_secs - 120.0).abs() < f64::EPSILON);
}

#[test]
fn empty_day_aggregates_to_zero() {
    let conn = open_db_in_memory().unwrap();
    let doctor = create_user(&conn, UserRole::Doctor, "+15550400003");

    let stat = stats(&conn).refresh_daily_stat(doctor, day(), None).unwrap();
    assert_eq!(stat.consultation_count, 0);
    assert_eq!(stat.unique_patients, 0);
    assert_eq!(stat.average_duration_secs, 0.0);
}

#[test]
fn refreshing_a_day_twice_updates_in_place() {
    let conn = open_db_in_memory().unwrap();
    let alice = create_user(&conn, UserRole::Patient, "+15550400001");
    let doctor = create_user(&conn, UserRole::Doctor, "+15550400003");
    let service = stats(&conn);

    store_call(&conn, alice, doctor, DAY_START_MS + 10 * HOUR_MS, 600, true);
    let first = service
        .refresh_daily_stat(doctor, day(), Some(15_000))
        .unwrap();
    assert_eq!(first.consultation_count, 1);
    assert_eq!(first.revenue_cents, Some(15_000));

    store_call(&conn, alice, doctor, DAY_START_MS + 11 * HOUR_MS, 1200, true);
    let second = service
        .refresh_daily_stat(doctor, day(), Some(30_000))
        .unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.created_at, first.created_at);
    assert_eq!(second.consultation_count, 2);
    assert_eq!(second.unique_patients, 1);
    assert!((second.average_duration_secs - 900.0).abs() < f64::EPSILON);
    assert_eq!(second.revenue_cents, Some(30_000));

    let rows = service.stats_between(doctor, day(), day()).unwrap();
    assert_eq!(rows.len(), 1);
}

#[test]
fn refresh_without_revenue_keeps_stored_revenue() {
    let conn = open_db_in_memory().unwrap();
    let doctor = create_user(&conn, UserRole::Doctor, "+15550400003");
    let service = stats(&conn);

    service
        .refresh_daily_stat(doctor, day(), Some(12_500))
        .unwrap();
    let refreshed = service.refresh_daily_stat(doctor, day(), None).unwrap();
    assert_eq!(refreshed.revenue_cents, Some(12_500));

    let corrected = service
        .refresh_daily_stat(doctor, day(), Some(9_000))
        .unwrap();
    assert_eq!(corrected.revenue_cents, Some(9_000));
}

#[test]
fn stats_between_is_inclusive_and_ordered() {
    let conn = open_db_in_memory().unwrap();
    let doctor = create_user(&conn, UserRole::Doctor, "+15550400003");
    let service = stats(&conn);

    let before = day().pred_opt().unwrap();
    for date in [next_day(), before, day()] {
        service.refresh_daily_stat(doctor, date, None).unwrap();
    }

    let dates: Vec<NaiveDate> = service
        .stats_between(doctor, day(), next_day())
        .unwrap()
        .into_iter()
        .map(|stat| stat.stat_date)
        .collect();
    assert_eq!(dates, vec![day(), next_day()]);
}

#[test]
fn stats_are_for_doctors_only() {
    let conn = open_db_in_memory().unwrap();
    let alice = create_user(&conn, UserRole::Patient, "+15550400001");

    assert!(matches!(
        stats(&conn).refresh_daily_stat(alice, day(), None),
        Err(ServiceError::RoleMismatch {
            expected: UserRole::Doctor,
            ..
        })
    ));
}

#[test]
fn negative_revenue_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let doctor = create_user(&conn, UserRole::Doctor, "+15550400003");

    assert!(matches!(
        stats(&conn).refresh_daily_stat(doctor, day(), Some(-1)),
        Err(ServiceError::Validation(_))
    ));
}
