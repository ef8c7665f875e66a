use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use futures::future::join_all;
use uuid::Uuid;

use appointment_cell::services::BookingCoordinator;
use availability_cell::models::{
    AppointmentStatus, CasOutcome, ClinicWindows, SlotChange, SlotKey, SlotStatus,
};
use availability_cell::services::{
    AvailabilityRepository, AvailabilityService, InMemoryAvailabilityRepository, SlotGenerator,
    StaticDoctorDirectory,
};
use availability_cell::SchedulingError;
use shared_utils::test_utils::TestCalendar as Cal;

const NINE: &str = "2024-06-10T09:00";
const NINE_THIRTY: &str = "2024-06-10T09:30";
const TEN: &str = "2024-06-10T10:00";
const TEN_THIRTY: &str = "2024-06-10T10:30";

struct Clinic {
    repository: Arc<InMemoryAvailabilityRepository>,
    availability: AvailabilityService,
    coordinator: BookingCoordinator,
    doctor: Uuid,
    date: NaiveDate,
}

impl Clinic {
    /// D1 on 2024-06-10, 09:00-11:00 in 30 minute slots.
    async fn open() -> Self {
        let repository = Arc::new(InMemoryAvailabilityRepository::new());
        let availability = AvailabilityService::with_parts(
            repository.clone(),
            Arc::new(StaticDoctorDirectory::new()),
            SlotGenerator::utc(),
            30,
        );
        let doctor = Uuid::new_v4();
        let date = Cal::reference_day();
        availability
            .mark_available(doctor, date, &ClinicWindows::morning(Cal::time(9, 0), Cal::time(11, 0)), 30)
            .await
            .unwrap();

        Self {
            coordinator: BookingCoordinator::with_repository(repository.clone()),
            availability,
            repository,
            doctor,
            date,
        }
    }

    async fn status_of(&self, slot_id: &str) -> SlotStatus {
        self.repository
            .find_date(self.doctor, self.date)
            .await
            .unwrap()
            .unwrap()
            .slot(slot_id)
            .unwrap()
            .status
    }

    async fn force(&self, slot_id: &str, from: SlotStatus, to: SlotStatus) {
        let key = SlotKey::new(self.doctor, self.date, slot_id);
        let outcome = self
            .repository
            .compare_and_set(&key, from, SlotChange::to(to, Utc::now()))
            .await
            .unwrap();
        assert_matches!(outcome, CasOutcome::Applied(_));
    }
}

fn after_clinic() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap()
}

#[tokio::test]
async fn booking_an_open_slot_creates_an_appointment() {
    let clinic = Clinic::open().await;
    let patient = Uuid::new_v4();

    let appointment = clinic
        .coordinator
        .book(clinic.doctor, clinic.date, NINE_THIRTY, patient)
        .await
        .unwrap();

    assert_eq!(appointment.patient_id, patient);
    assert_eq!(appointment.doctor_id, clinic.doctor);
    assert_eq!(appointment.slot_id, NINE_THIRTY);
    assert_eq!(appointment.status, AppointmentStatus::Booked);
    assert_eq!(appointment.start_time, Utc.with_ymd_and_hms(2024, 6, 10, 9, 30, 0).unwrap());
    assert_eq!(clinic.status_of(NINE_THIRTY).await, SlotStatus::Booked);
}

#[tokio::test]
async fn booking_a_booked_slot_is_rejected() {
    let clinic = Clinic::open().await;
    clinic.coordinator.book(clinic.doctor, clinic.date, NINE, Uuid::new_v4()).await.unwrap();

    let err = clinic
        .coordinator
        .book(clinic.doctor, clinic.date, NINE, Uuid::new_v4())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        SchedulingError::SlotNotAvailable {
            slot_id: NINE.to_string(),
            status: SlotStatus::Booked
        }
    );
}

#[tokio::test]
async fn booking_unknown_slot_or_date_is_not_found() {
    let clinic = Clinic::open().await;

    let err = clinic
        .coordinator
        .book(clinic.doctor, clinic.date, "2024-06-10T11:00", Uuid::new_v4())
        .await
        .unwrap_err();
    assert_matches!(err, SchedulingError::SlotNotFound(key) if key.slot_id == "2024-06-10T11:00");

    let err = clinic
        .coordinator
        .book(clinic.doctor, Cal::date(2024, 6, 11), "2024-06-11T09:00", Uuid::new_v4())
        .await
        .unwrap_err();
    assert_matches!(err, SchedulingError::SlotNotFound(_));
}

#[tokio::test]
async fn concurrent_bookings_have_exactly_one_winner() {
    let clinic = Clinic::open().await;

    let attempts = (0..16).map(|_| clinic.coordinator.book(clinic.doctor, clinic.date, TEN, Uuid::new_v4()));
    let results = join_all(attempts).await;

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    for result in results.iter().filter(|r| r.is_err()) {
        assert_matches!(
            result,
            Err(SchedulingError::SlotNotAvailable { status: SlotStatus::Booked, .. })
        );
    }

    let appointments = clinic
        .repository
        .find_date(clinic.doctor, clinic.date)
        .await
        .unwrap()
        .unwrap()
        .slot(TEN)
        .unwrap()
        .appointment
        .clone()
        .unwrap();
    assert_eq!(appointments.id, winners[0].id);
}

#[tokio::test]
async fn concurrent_bookings_across_tasks_have_exactly_one_winner() {
    let clinic = Arc::new(Clinic::open().await);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let clinic = Arc::clone(&clinic);
            tokio::spawn(async move {
                clinic
                    .coordinator
                    .book(clinic.doctor, clinic.date, TEN_THIRTY, Uuid::new_v4())
                    .await
            })
        })
        .collect();

    let mut won = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            won += 1;
        }
    }
    assert_eq!(won, 1);
}

#[tokio::test]
async fn book_then_cancel_cancels_slot_and_appointment() {
    let clinic = Clinic::open().await;
    let appointment = clinic
        .coordinator
        .book(clinic.doctor, clinic.date, NINE, Uuid::new_v4())
        .await
        .unwrap();

    let outcome = clinic.coordinator.cancel_slot(clinic.doctor, clinic.date, NINE).await.unwrap();

    assert!(outcome.changed);
    assert_eq!(outcome.slot.status, SlotStatus::Cancelled);
    let cancelled = outcome.slot.appointment.unwrap();
    assert_eq!(cancelled.id, appointment.id);
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
}

#[tokio::test]
async fn cancelling_an_open_slot_closes_it() {
    let clinic = Clinic::open().await;

    let outcome = clinic.coordinator.cancel_slot(clinic.doctor, clinic.date, TEN).await.unwrap();
    assert!(outcome.changed);
    assert!(outcome.slot.appointment.is_none());

    let err = clinic
        .coordinator
        .book(clinic.doctor, clinic.date, TEN, Uuid::new_v4())
        .await
        .unwrap_err();
    assert_matches!(err, SchedulingError::SlotNotAvailable { status: SlotStatus::Cancelled, .. });
}

#[tokio::test]
async fn cancelling_twice_is_a_no_op() {
    let clinic = Clinic::open().await;
    clinic.coordinator.cancel_slot(clinic.doctor, clinic.date, NINE).await.unwrap();

    let again = clinic.coordinator.cancel_slot(clinic.doctor, clinic.date, NINE).await.unwrap();
    assert!(!again.changed);
    assert_eq!(again.slot.status, SlotStatus::Cancelled);
}

#[tokio::test]
async fn cancelling_a_completed_slot_is_an_invalid_transition() {
    let clinic = Clinic::open().await;
    clinic.coordinator.book(clinic.doctor, clinic.date, NINE, Uuid::new_v4()).await.unwrap();
    clinic
        .coordinator
        .complete_slot(clinic.doctor, clinic.date, NINE, after_clinic())
        .await
        .unwrap();

    let err = clinic.coordinator.cancel_slot(clinic.doctor, clinic.date, NINE).await.unwrap_err();
    assert_eq!(
        err,
        SchedulingError::InvalidTransition {
            from: SlotStatus::Completed,
            to: SlotStatus::Cancelled
        }
    );
}

#[tokio::test]
async fn cancel_all_cancels_everything_but_completed_slots() {
    let clinic = Clinic::open().await;
    clinic.coordinator.book(clinic.doctor, clinic.date, NINE, Uuid::new_v4()).await.unwrap();
    clinic.coordinator.book(clinic.doctor, clinic.date, NINE_THIRTY, Uuid::new_v4()).await.unwrap();
    clinic.force(NINE_THIRTY, SlotStatus::Booked, SlotStatus::Completed).await;
    clinic.force(TEN, SlotStatus::Open, SlotStatus::Cancelled).await;

    let outcome = clinic.coordinator.cancel_all_slots(clinic.doctor, clinic.date).await.unwrap();

    // 09:00 booked, 10:00 already cancelled, 10:30 open. 09:30 completed.
    assert_eq!(outcome.cancelled, 3);
    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(outcome.skipped[0].slot_id, NINE_THIRTY);
    assert!(outcome.skipped[0].reason.contains("completed"));

    assert_eq!(clinic.status_of(NINE).await, SlotStatus::Cancelled);
    assert_eq!(clinic.status_of(NINE_THIRTY).await, SlotStatus::Completed);
    assert_eq!(clinic.status_of(TEN_THIRTY).await, SlotStatus::Cancelled);
}

#[tokio::test]
async fn cancel_all_on_undeclared_date_is_empty() {
    let clinic = Clinic::open().await;

    let outcome = clinic
        .coordinator
        .cancel_all_slots(clinic.doctor, Cal::date(2024, 6, 11))
        .await
        .unwrap();
    assert_eq!(outcome.cancelled, 0);
    assert!(outcome.skipped.is_empty());
}

#[tokio::test]
async fn completing_requires_a_booked_slot_that_has_ended() {
    let clinic = Clinic::open().await;

    let err = clinic
        .coordinator
        .complete_slot(clinic.doctor, clinic.date, NINE, after_clinic())
        .await
        .unwrap_err();
    assert_matches!(err, SchedulingError::InvalidTransition { from: SlotStatus::Open, .. });

    clinic.coordinator.book(clinic.doctor, clinic.date, NINE, Uuid::new_v4()).await.unwrap();
    let during = Utc.with_ymd_and_hms(2024, 6, 10, 9, 15, 0).unwrap();
    let err = clinic
        .coordinator
        .complete_slot(clinic.doctor, clinic.date, NINE, during)
        .await
        .unwrap_err();
    assert_matches!(err, SchedulingError::SlotNotElapsed { ends_at, .. } if ends_at == during + Duration::minutes(15));

    let slot = clinic
        .coordinator
        .complete_slot(clinic.doctor, clinic.date, NINE, after_clinic())
        .await
        .unwrap();
    assert_eq!(slot.status, SlotStatus::Completed);
    assert_eq!(slot.appointment.unwrap().status, AppointmentStatus::Completed);
}

#[tokio::test]
async fn concurrent_cancels_on_one_date_all_succeed() {
    let clinic = Clinic::open().await;
    for slot_id in [NINE, NINE_THIRTY, TEN, TEN_THIRTY] {
        clinic.coordinator.book(clinic.doctor, clinic.date, slot_id, Uuid::new_v4()).await.unwrap();
    }

    let cancels = [NINE, NINE_THIRTY, TEN, TEN_THIRTY]
        .map(|slot_id| clinic.coordinator.cancel_slot(clinic.doctor, clinic.date, slot_id));
    let results = join_all(cancels).await;

    assert!(results.iter().all(|r| matches!(r, Ok(outcome) if outcome.changed)));
}

#[tokio::test]
async fn cancel_racing_a_booking_ends_cancelled() {
    for _ in 0..20 {
        let clinic = Clinic::open().await;

        let (booked, cancelled) = tokio::join!(
            clinic.coordinator.book(clinic.doctor, clinic.date, TEN, Uuid::new_v4()),
            clinic.coordinator.cancel_slot(clinic.doctor, clinic.date, TEN),
        );

        // Whichever ran first, the cancel wins the final state.
        let cancelled = cancelled.unwrap();
        assert_eq!(cancelled.slot.status, SlotStatus::Cancelled);
        assert_eq!(clinic.status_of(TEN).await, SlotStatus::Cancelled);

        if let Ok(appointment) = booked {
            let bound = cancelled.slot.appointment.unwrap();
            assert_eq!(bound.id, appointment.id);
            assert_eq!(bound.status, AppointmentStatus::Cancelled);
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn remarking_racing_a_booking_never_drops_the_booking() {
    for _ in 0..25 {
        let clinic = Arc::new(Clinic::open().await);
        let patient = Uuid::new_v4();

        // 10:30 only exists in the 30 minute layout, not in the hourly one.
        let remark = {
            let clinic = Arc::clone(&clinic);
            tokio::spawn(async move {
                let windows = ClinicWindows::morning(Cal::time(9, 0), Cal::time(11, 0));
                clinic.availability.mark_available(clinic.doctor, clinic.date, &windows, 60).await
            })
        };
        let book = {
            let clinic = Arc::clone(&clinic);
            tokio::spawn(async move {
                clinic.coordinator.book(clinic.doctor, clinic.date, TEN_THIRTY, patient).await
            })
        };
        let (remarked, booked) = (remark.await.unwrap(), book.await.unwrap());

        match (remarked, booked) {
            (Err(err), Ok(appointment)) => {
                assert_matches!(err, SchedulingError::ConflictingAvailability { active_slots, .. }
                    if active_slots == vec![TEN_THIRTY.to_string()]);
                let slot = clinic.availability.get_slots(clinic.doctor, clinic.date).await.unwrap();
                let bound = slot.iter().find(|s| s.slot_id == TEN_THIRTY).unwrap();
                assert_eq!(bound.status, SlotStatus::Booked);
                assert_eq!(bound.appointment.as_ref().unwrap().id, appointment.id);
            }
            (Ok(replaced), Err(err)) => {
                assert_matches!(err, SchedulingError::SlotNotFound(_) | SchedulingError::SlotNotAvailable { .. });
                assert_eq!(replaced.slots.len(), 2);
                assert_eq!(replaced.counts().open, 2);
            }
            (remarked, booked) => panic!("both sides succeeded or failed: {:?} / {:?}", remarked, booked),
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn withdrawing_racing_a_booking_never_drops_the_booking() {
    for _ in 0..25 {
        let clinic = Arc::new(Clinic::open().await);

        let withdraw = {
            let clinic = Arc::clone(&clinic);
            tokio::spawn(async move { clinic.availability.withdraw_availability(clinic.doctor, clinic.date).await })
        };
        let book = {
            let clinic = Arc::clone(&clinic);
            tokio::spawn(async move {
                clinic.coordinator.book(clinic.doctor, clinic.date, NINE, Uuid::new_v4()).await
            })
        };
        let (withdrawn, booked) = (withdraw.await.unwrap(), book.await.unwrap());

        match (withdrawn, booked) {
            (Err(err), Ok(_)) => {
                assert_matches!(err, SchedulingError::ConflictingAvailability { .. });
                assert_eq!(clinic.status_of(NINE).await, SlotStatus::Booked);
            }
            (Ok(removed), Err(err)) => {
                assert!(removed);
                assert_matches!(err, SchedulingError::SlotNotFound(_));
                assert!(clinic.repository.find_date(clinic.doctor, clinic.date).await.unwrap().is_none());
            }
            (withdrawn, booked) => panic!("both sides succeeded or failed: {:?} / {:?}", withdrawn, booked),
        }
    }
}
