use rusqlite::Connection;
use std::cell::Cell;
use telecare_core::db::open_db_in_memory;
use telecare_core::repo::consultation_repo::{ConsultationRepository, SqliteConsultationRepository};
use telecare_core::repo::user_repo::{SqliteUserRepository, UserRepository};
use telecare_core::service::consultation_service::ConsultationService;
use telecare_core::{
    Consultation, ConsultationStatus, EntityId, Page, RepoError, ServiceError, User, UserRole,
    ValidationError,
};
use uuid::Uuid;

const START_MS: i64 = 1_700_000_000_000;
const TICK_MS: i64 = 60_000;

thread_local! {
    static NOW: Cell<i64> = const { Cell::new(START_MS) };
}

/// Advances one minute per call so lifecycle timestamps are distinct.
fn ticking_clock() -> i64 {
    NOW.with(|now| {
        let value = now.get();
        now.set(value + TICK_MS);
        value
    })
}

type Service<'conn> =
    ConsultationService<SqliteConsultationRepository<'conn>, SqliteUserRepository<'conn>>;

fn service(conn: &Connection) -> Service<'_> {
    ConsultationService::with_clock(
        SqliteConsultationRepository::try_new(conn).unwrap(),
        SqliteUserRepository::try_new(conn).unwrap(),
        ticking_clock,
    )
}

fn create_user(conn: &Connection, role: UserRole, phone: &str) -> EntityId {
    let repo = SqliteUserRepository::try_new(conn).unwrap();
    let user = User::new(role, "Test User", phone, "hash").unwrap();
    repo.create_user(&user).unwrap()
}

fn participants(conn: &Connection) -> (EntityId, EntityId) {
    (
        create_user(conn, UserRole::Patient, "+15550200001"),
        create_user(conn, UserRole::Doctor, "+15550200002"),
    )
}

#[test]
fn happy_path_stamps_every_lifecycle_timestamp() {
    let conn = open_db_in_memory().unwrap();
    let (patient, doctor) = participants(&conn);
    let consultations = service(&conn);

    let requested = consultations.request_consultation(patient).unwrap();
    assert_eq!(requested.status, ConsultationStatus::Requested);
    assert_eq!(requested.doctor_id, None);
    assert_eq!(requested.requested_at, START_MS);

    let accepted = consultations.accept(requested.id, doctor).unwrap();
    assert_eq!(accepted.status, ConsultationStatus::Accepted);
    assert_eq!(accepted.doctor_id, Some(doctor));
    assert_eq!(accepted.accepted_at, Some(START_MS + TICK_MS));

    let started = consultations
        .start(requested.id, Some(" room-17 ".to_string()))
        .unwrap();
    assert_eq!(started.status, ConsultationStatus::InProgress);
    assert_eq!(started.video_call_id.as_deref(), Some("room-17"));
    assert_eq!(started.started_at, Some(START_MS + 2 * TICK_MS));

    let completed = consultations.complete(requested.id).unwrap();
    assert_eq!(completed.status, ConsultationStatus::Completed);
    assert_eq!(completed.ended_at, Some(START_MS + 3 * TICK_MS));
    assert_eq!(completed.duration_secs, Some(60));
}

#[test]
fn terminal_consultations_reject_every_transition() {
    let conn = open_db_in_memory().unwrap();
    let (patient, doctor) = participants(&conn);
    let consultations = service(&conn);

    let id = consultations.request_consultation(patient).unwrap().id;
    consultations.accept(id, doctor).unwrap();
    consultations.start(id, None).unwrap();
    consultations.complete(id).unwrap();

    let attempts = [
        consultations.accept(id, doctor),
        consultations.start(id, None),
        consultations.complete(id),
        consultations.reject(id, doctor, None),
        consultations.cancel(id),
        consultations.fail(id),
    ];
    for attempt in attempts {
        assert!(matches!(
            attempt,
            Err(ServiceError::InvalidTransition {
                from: ConsultationStatus::Completed,
                ..
            })
        ));
    }
    assert_eq!(
        consultations.get_consultation(id).unwrap().status,
        ConsultationStatus::Completed
    );
}

#[test]
fn skipping_a_step_is_an_invalid_transition() {
    let conn = open_db_in_memory().unwrap();
    let (patient, _) = participants(&conn);
    let consultations = service(&conn);

    let id = consultations.request_consultation(patient).unwrap().id;

    assert!(matches!(
        consultations.start(id, None),
        Err(ServiceError::InvalidTransition {
            from: ConsultationStatus::Requested,
            to: ConsultationStatus::InProgress,
        })
    ));
}

#[test]
fn reject_assigns_the_declining_doctor() {
    let conn = open_db_in_memory().unwrap();
    let (patient, doctor) = participants(&conn);
    let consultations = service(&conn);

    let id = consultations.request_consultation(patient).unwrap().id;
    let rejected = consultations
        .reject(id, doctor, Some("  outside my specialty ".to_string()))
        .unwrap();

    assert_eq!(rejected.status, ConsultationStatus::Rejected);
    assert_eq!(rejected.doctor_id, Some(doctor));
    assert_eq!(
        rejected.rejection_reason.as_deref(),
        Some("outside my specialty")
    );
    assert!(rejected.ended_at.is_some());
}

#[test]
fn cancel_and_fail_may_keep_doctor_unassigned() {
    let conn = open_db_in_memory().unwrap();
    let (patient, _) = participants(&conn);
    let consultations = service(&conn);

    let cancelled = consultations
        .cancel(consultations.request_consultation(patient).unwrap().id)
        .unwrap();
    assert_eq!(cancelled.status, ConsultationStatus::Cancelled);
    assert_eq!(cancelled.doctor_id, None);

    let failed = consultations
        .fail(consultations.request_consultation(patient).unwrap().id)
        .unwrap();
    assert_eq!(failed.status, ConsultationStatus::Failed);
    assert_eq!(failed.doctor_id, None);
    assert_eq!(failed.duration_secs, None);
}

#[test]
fn failing_an_active_call_records_its_duration() {
    let conn = open_db_in_memory().unwrap();
    let (patient, doctor) = participants(&conn);
    let consultations = service(&conn);

    let id = consultations.request_consultation(patient).unwrap().id;
    consultations.accept(id, doctor).unwrap();
    consultations.start(id, None).unwrap();
    let failed = consultations.fail(id).unwrap();

    assert_eq!(failed.doctor_id, Some(doctor));
    assert_eq!(failed.duration_secs, Some(60));
}

#[test]
fn accepted_consultation_keeps_its_doctor_when_cancelled_or_failed() {
    let conn = open_db_in_memory().unwrap();
    let (patient, doctor) = participants(&conn);
    let consultations = service(&conn);
    let repo = SqliteConsultationRepository::try_new(&conn).unwrap();

    let to_cancel = consultations.request_consultation(patient).unwrap().id;
    let accepted = consultations.accept(to_cancel, doctor).unwrap();
    let cancelled = consultations.cancel(to_cancel).unwrap();
    assert_eq!(cancelled.status, ConsultationStatus::Cancelled);
    assert_eq!(cancelled.doctor_id, Some(doctor));
    assert!(cancelled.ended_at > accepted.accepted_at);
    assert_eq!(cancelled.started_at, None);
    assert_eq!(cancelled.duration_secs, None);

    let to_fail = consultations.request_consultation(patient).unwrap().id;
    consultations.accept(to_fail, doctor).unwrap();
    let failed = consultations.fail(to_fail).unwrap();
    assert_eq!(failed.status, ConsultationStatus::Failed);
    assert_eq!(failed.doctor_id, Some(doctor));
    assert!(failed.ended_at.is_some());
    assert_eq!(failed.duration_secs, None);

    let stored = repo.get_consultation(to_fail).unwrap().unwrap();
    assert_eq!(stored.status, ConsultationStatus::Failed);
    assert_eq!(stored.doctor_id, Some(doctor));
    assert_eq!(stored.ended_at, failed.ended_at);
}

#[test]
fn doctor_assignment_rule_is_enforced_before_and_in_storage() {
    let conn = open_db_in_memory().unwrap();
    let (patient, doctor) = participants(&conn);
    let repo = SqliteConsultationRepository::try_new(&conn).unwrap();

    let mut requested_with_doctor = Consultation::request(patient, START_MS);
    requested_with_doctor.doctor_id = Some(doctor);
    assert!(matches!(
        repo.create_consultation(&requested_with_doctor),
        Err(RepoError::Validation(ValidationError::DoctorStatusMismatch {
            status: ConsultationStatus::Requested,
            has_doctor: true,
        }))
    ));

    let id = repo
        .create_consultation(&Consultation::request(patient, START_MS))
        .unwrap();
    let raw = conn
        .execute(
            "UPDATE consultations SET status = 'accepted' WHERE id = ?1;",
            [id.to_string()],
        )
        .unwrap_err();
    assert!(matches!(RepoError::from(raw), RepoError::Conflict(_)));
}

#[test]
fn lost_compare_and_set_race_is_a_conflict() {
    let conn = open_db_in_memory().unwrap();
    let (patient, doctor) = participants(&conn);
    let repo = SqliteConsultationRepository::try_new(&conn).unwrap();

    let original = Consultation::request(patient, START_MS);
    repo.create_consultation(&original).unwrap();

    let mut accepted = original.clone();
    accepted.accept(doctor, START_MS + TICK_MS).unwrap();
    let mut cancelled = original.clone();
    cancelled.cancel(START_MS + TICK_MS).unwrap();

    repo.apply_transition(ConsultationStatus::Requested, &accepted)
        .unwrap();
    assert!(matches!(
        repo.apply_transition(ConsultationStatus::Requested, &cancelled),
        Err(RepoError::Conflict(_))
    ));

    let stored = repo.get_consultation(original.id).unwrap().unwrap();
    assert_eq!(stored.status, ConsultationStatus::Accepted);
    assert_eq!(stored.doctor_id, Some(doctor));
}

#[test]
fn transition_of_missing_consultation_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let (patient, _) = participants(&conn);
    let repo = SqliteConsultationRepository::try_new(&conn).unwrap();
    let consultations = service(&conn);

    let mut ghost = Consultation::request(patient, START_MS);
    ghost.cancel(START_MS).unwrap();
    assert!(matches!(
        repo.apply_transition(ConsultationStatus::Requested, &ghost),
        Err(RepoError::NotFound {
            entity: "consultation",
            ..
        })
    ));

    let missing = Uuid::new_v4();
    assert!(matches!(
        consultations.cancel(missing),
        Err(ServiceError::NotFound { id, .. }) if id == missing
    ));
}

#[test]
fn only_active_users_in_the_right_role_take_part() {
    let conn = open_db_in_memory().unwrap();
    let (patient, doctor) = participants(&conn);
    let users = SqliteUserRepository::try_new(&conn).unwrap();
    let consultations = service(&conn);

    assert!(matches!(
        consultations.request_consultation(doctor),
        Err(ServiceError::RoleMismatch {
            expected: UserRole::Patient,
            ..
        })
    ));

    let id = consultations.request_consultation(patient).unwrap().id;
    assert!(matches!(
        consultations.accept(id, patient),
        Err(ServiceError::RoleMismatch {
            expected: UserRole::Doctor,
            ..
        })
    ));

    users.set_active(doctor, false).unwrap();
    assert!(matches!(
        consultations.accept(id, doctor),
        Err(ServiceError::InactiveUser(user)) if user == doctor
    ));

    users.set_active(patient, false).unwrap();
    assert!(matches!(
        consultations.request_consultation(patient),
        Err(ServiceError::InactiveUser(_))
    ));
}

#[test]
fn list_helpers_filter_by_participant_and_status() {
    let conn = open_db_in_memory().unwrap();
    let (patient, doctor) = participants(&conn);
    let consultations = service(&conn);

    let first = consultations.request_consultation(patient).unwrap().id;
    let second = consultations.request_consultation(patient).unwrap().id;
    consultations.request_consultation(patient).unwrap();
    consultations.accept(first, doctor).unwrap();
    consultations.reject(second, doctor, None).unwrap();

    let mine = consultations.list_for_patient(patient, Page::default()).unwrap();
    assert_eq!(mine.len(), 3);
    assert!(mine
        .windows(2)
        .all(|pair| pair[0].requested_at >= pair[1].requested_at));

    let pending = consultations.pending_requests(Page::default()).unwrap();
    assert_eq!(pending.len(), 1);

    let accepted = consultations
        .list_for_doctor(doctor, Some(ConsultationStatus::Accepted), Page::default())
        .unwrap();
    assert_eq!(accepted.len(), 1);
    assert_eq!(accepted[0].id, first);

    let page = consultations.list_for_doctor(doctor, None, Page::first(1)).unwrap();
    assert_eq!(page.len(), 1);
}
