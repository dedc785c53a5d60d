use chrono::NaiveDate;
use rusqlite::Connection;
use telecare_core::db::open_db_in_memory;
use telecare_core::model::care_record::Prescription;
use telecare_core::repo::care_record_repo::{
    PrescriptionRepository, SqlitePrescriptionRepository, SqliteReportRepository,
};
use telecare_core::repo::consultation_repo::SqliteConsultationRepository;
use telecare_core::repo::notification_repo::{NotificationListQuery, SqliteNotificationRepository};
use telecare_core::repo::user_repo::{SqliteUserRepository, UserRepository};
use telecare_core::service::care_record_service::{CareRecordService, ReportInput};
use telecare_core::service::consultation_service::ConsultationService;
use telecare_core::service::notification_service::NotificationService;
use telecare_core::{ConsultationStatus, EntityId, RepoError, ServiceError, User, UserRole};
use uuid::Uuid;

fn fixed_clock() -> i64 {
    1_700_000_000_000
}

struct Fixture {
    patient: EntityId,
    doctor: EntityId,
    other_doctor: EntityId,
    consultation: EntityId,
}

fn create_user(conn: &Connection, role: UserRole, phone: &str) -> EntityId {
    let repo = SqliteUserRepository::try_new(conn).unwrap();
    let user = User::new(role, "Test User", phone, "hash").unwrap();
    repo.create_user(&user).unwrap()
}

fn lifecycle(conn: &Connection) -> ConsultationService<SqliteConsultationRepository<'_>, SqliteUserRepository<'_>> {
    ConsultationService::with_clock(
        SqliteConsultationRepository::try_new(conn).unwrap(),
        SqliteUserRepository::try_new(conn).unwrap(),
        fixed_clock,
    )
}

fn records(
    conn: &Connection,
) -> CareRecordService<
    SqliteConsultationRepository<'_>,
    SqlitePrescriptionRepository<'_>,
    SqliteReportRepository<'_>,
> {
    CareRecordService::new(
        SqliteConsultationRepository::try_new(conn).unwrap(),
        SqlitePrescriptionRepository::try_new(conn).unwrap(),
        SqliteReportRepository::try_new(conn).unwrap(),
    )
}

fn notifications(
    conn: &Connection,
) -> NotificationService<SqliteNotificationRepository<'_>, SqliteConsultationRepository<'_>> {
    NotificationService::new(
        SqliteNotificationRepository::try_new(conn).unwrap(),
        SqliteConsultationRepository::try_new(conn).unwrap(),
    )
}

/// Patient, two doctors and one `requested` consultation.
fn fixture(conn: &Connection) -> Fixture {
    let patient = create_user(conn, UserRole::Patient, "+15550300001");
    let doctor = create_user(conn, UserRole::Doctor, "+15550300002");
    let other_doctor = create_user(conn, UserRole::Doctor, "+15550300003");
    let consultation = lifecycle(conn).request_consultation(patient).unwrap().id;
    Fixture {
        patient,
        doctor,
        other_doctor,
        consultation,
    }
}

fn start_call(conn: &Connection, fixture: &Fixture) {
    let service = lifecycle(conn);
    service.accept(fixture.consultation, fixture.doctor).unwrap();
    service.start(fixture.consultation, Some("room-1".to_string())).unwrap();
}

#[test]
fn prescription_on_requested_consultation_is_not_ready() {
    let conn = open_db_in_memory().unwrap();
    let fx = fixture(&conn);

    let err = records(&conn)
        .issue_prescription(fx.consultation, fx.doctor, "Ibuprofen 200mg")
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::ConsultationNotReady {
            status: ConsultationStatus::Requested,
            ..
        }
    ));
}

#[test]
fn prescription_on_accepted_consultation_is_not_ready() {
    let conn = open_db_in_memory().unwrap();
    let fx = fixture(&conn);
    lifecycle(&conn).accept(fx.consultation, fx.doctor).unwrap();

    assert!(matches!(
        records(&conn).issue_prescription(fx.consultation, fx.doctor, "Rest"),
        Err(ServiceError::ConsultationNotReady {
            status: ConsultationStatus::Accepted,
            ..
        })
    ));
}

#[test]
fn prescription_copies_participants_from_consultation() {
    let conn = open_db_in_memory().unwrap();
    let fx = fixture(&conn);
    start_call(&conn, &fx);
    let service = records(&conn);

    let prescription = service
        .issue_prescription(fx.consultation, fx.doctor, "  Amoxicillin 500mg, 3x daily  ")
        .unwrap();

    assert_eq!(prescription.consultation_id, fx.consultation);
    assert_eq!(prescription.patient_id, fx.patient);
    assert_eq!(prescription.doctor_id, fx.doctor);
    assert_eq!(prescription.content, "Amoxicillin 500mg, 3x daily");
    assert!(!prescription.is_fulfilled);

    let fulfilled = service.fulfil_prescription(prescription.id).unwrap();
    assert!(fulfilled.is_fulfilled);
    assert!(service
        .prescriptions_for_patient(fx.patient, false)
        .unwrap()
        .is_empty());
    assert_eq!(
        service.prescriptions_for_patient(fx.patient, true).unwrap().len(),
        1
    );
}

#[test]
fn only_the_assigned_doctor_may_issue_records() {
    let conn = open_db_in_memory().unwrap();
    let fx = fixture(&conn);
    start_call(&conn, &fx);

    let err = records(&conn)
        .issue_prescription(fx.consultation, fx.other_doctor, "Rest")
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::NotParticipant { user_id, .. } if user_id == fx.other_doctor
    ));
}

#[test]
fn storage_rejects_mismatched_prescription_participants() {
    let conn = open_db_in_memory().unwrap();
    let fx = fixture(&conn);
    start_call(&conn, &fx);
    let repo = SqlitePrescriptionRepository::try_new(&conn).unwrap();

    let forged = Prescription::new(fx.consultation, fx.patient, fx.other_doctor, "Rest");
    assert!(matches!(
        repo.create_prescription(&forged),
        Err(RepoError::Conflict(_))
    ));

    let orphan = Prescription::new(Uuid::new_v4(), fx.patient, fx.doctor, "Rest");
    assert!(matches!(
        repo.create_prescription(&orphan),
        Err(RepoError::MissingReference(_))
    ));
}

#[test]
fn report_is_filed_and_amended_by_its_doctor() {
    let conn = open_db_in_memory().unwrap();
    let fx = fixture(&conn);
    start_call(&conn, &fx);
    lifecycle(&conn).complete(fx.consultation).unwrap();
    let service = records(&conn);

    let follow_up = NaiveDate::from_ymd_opt(2023, 12, 1).unwrap();
    let report = service
        .file_report(
            fx.consultation,
            fx.doctor,
            &ReportInput {
                diagnosis: "Seasonal allergy".to_string(),
                notes: Some(" ".to_string()),
                treatment_plan: Some("Antihistamine for two weeks".to_string()),
                follow_up_date: Some(follow_up),
            },
        )
        .unwrap();
    assert_eq!(report.patient_id, fx.patient);
    assert_eq!(report.notes, None);
    assert_eq!(report.follow_up_date, Some(follow_up));

    let amended_input = ReportInput {
        diagnosis: "Allergic rhinitis".to_string(),
        ..ReportInput::default()
    };
    assert!(matches!(
        service.update_report(report.id, fx.other_doctor, &amended_input),
        Err(ServiceError::NotParticipant { .. })
    ));

    let amended = service
        .update_report(report.id, fx.doctor, &amended_input)
        .unwrap();
    assert_eq!(amended.diagnosis, "Allergic rhinitis");
    assert_eq!(amended.follow_up_date, None);

    let (prescriptions, reports) = service.records_for_consultation(fx.consultation).unwrap();
    assert!(prescriptions.is_empty());
    assert_eq!(reports.len(), 1);
    assert_eq!(service.reports_for_patient(fx.patient).unwrap().len(), 1);
}

#[test]
fn blank_diagnosis_is_a_validation_error() {
    let conn = open_db_in_memory().unwrap();
    let fx = fixture(&conn);
    start_call(&conn, &fx);

    assert!(matches!(
        records(&conn).file_report(fx.consultation, fx.doctor, &ReportInput::default()),
        Err(ServiceError::Validation(_))
    ));
}

#[test]
fn call_request_needs_an_assigned_doctor() {
    let conn = open_db_in_memory().unwrap();
    let fx = fixture(&conn);
    let service = notifications(&conn);

    assert!(matches!(
        service.notify_call_request(fx.consultation),
        Err(ServiceError::ConsultationNotReady { .. })
    ));

    lifecycle(&conn).accept(fx.consultation, fx.doctor).unwrap();
    let notification = service.notify_call_request(fx.consultation).unwrap();
    assert_eq!(notification.recipient_id, fx.doctor);
    assert!(notification.action_required);
    assert!(!notification.is_read);
}

#[test]
fn ended_consultations_get_no_call_notifications() {
    let conn = open_db_in_memory().unwrap();
    let fx = fixture(&conn);
    let service = notifications(&conn);

    lifecycle(&conn)
        .reject(fx.consultation, fx.doctor, Some("busy".to_string()))
        .unwrap();
    assert!(matches!(
        service.notify_call_request(fx.consultation),
        Err(ServiceError::ConsultationNotReady {
            status: ConsultationStatus::Rejected,
            ..
        })
    ));
    assert!(matches!(
        service.notify_call_reminder(fx.consultation, fx.patient, None),
        Err(ServiceError::ConsultationNotReady {
            status: ConsultationStatus::Rejected,
            ..
        })
    ));

    let completed = lifecycle(&conn).request_consultation(fx.patient).unwrap().id;
    let finished = Fixture {
        consultation: completed,
        ..fx
    };
    start_call(&conn, &finished);
    assert!(service.notify_call_request(completed).is_ok());
    lifecycle(&conn).complete(completed).unwrap();
    assert!(matches!(
        service.notify_call_request(completed),
        Err(ServiceError::ConsultationNotReady {
            status: ConsultationStatus::Completed,
            ..
        })
    ));
    assert!(matches!(
        service.notify_call_reminder(completed, finished.doctor, None),
        Err(ServiceError::ConsultationNotReady { .. })
    ));
    assert_eq!(service.unread_count(finished.doctor).unwrap(), 1);
}

#[test]
fn reminders_only_go_to_participants() {
    let conn = open_db_in_memory().unwrap();
    let fx = fixture(&conn);
    let service = notifications(&conn);

    let reminder = service
        .notify_call_reminder(fx.consultation, fx.patient, Some("Starts in 10 minutes".to_string()))
        .unwrap();
    assert_eq!(reminder.recipient_id, fx.patient);
    assert!(!reminder.action_required);

    // Doctor is not assigned yet, so they are not a participant.
    assert!(matches!(
        service.notify_call_reminder(fx.consultation, fx.doctor, None),
        Err(ServiceError::NotParticipant { .. })
    ));
}

#[test]
fn inbox_tracks_read_state() {
    let conn = open_db_in_memory().unwrap();
    let fx = fixture(&conn);
    let service = notifications(&conn);

    let first = service
        .notify_call_reminder(fx.consultation, fx.patient, None)
        .unwrap();
    let second = service
        .notify_call_reminder(fx.consultation, fx.patient, None)
        .unwrap();
    service
        .notify_call_reminder(fx.consultation, fx.patient, None)
        .unwrap();
    assert_eq!(service.unread_count(fx.patient).unwrap(), 3);

    let inbox = service
        .inbox(fx.patient, &NotificationListQuery::default())
        .unwrap();
    assert_eq!(inbox.len(), 3);
    assert_eq!(inbox[2].id, first.id);

    service.mark_read(second.id).unwrap();
    let unread = service
        .inbox(
            fx.patient,
            &NotificationListQuery {
                unread_only: true,
                ..NotificationListQuery::default()
            },
        )
        .unwrap();
    assert_eq!(unread.len(), 2);
    assert!(unread.iter().all(|item| item.id != second.id));

    assert_eq!(service.mark_all_read(fx.patient).unwrap(), 2);
    assert_eq!(service.unread_count(fx.patient).unwrap(), 0);
    assert_eq!(service.mark_all_read(fx.patient).unwrap(), 0);

    assert!(matches!(
        service.mark_read(Uuid::new_v4()),
        Err(ServiceError::NotFound {
            entity: "notification",
            ..
        })
    ));
}
