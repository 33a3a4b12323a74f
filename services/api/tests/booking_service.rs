//! BookingService exercised against the in-memory store with a fixed clock.

mod common;

use clinic_api::adapters::MemoryDb;
use clinic_core::domain::{Address, BookingMode, NewDoctor, NewUser};
use clinic_core::ports::{DatabaseService, PortError};
use clinic_core::{BookingRequest, BookingService, ClinicPolicy, WalkInRequest};
use common::{booking_service, date, monday_morning, time};
use futures::future::join_all;
use std::sync::Arc;
use uuid::Uuid;

async fn seed(db: &Arc<dyn DatabaseService>) -> (Uuid, Vec<Uuid>) {
    let doctor = db
        .create_doctor(NewDoctor {
            name: "Dr. Kabir Sen".to_string(),
            email: "kabir@clinic.test".to_string(),
            hashed_password: "not-a-real-hash".to_string(),
            image: "https://img.example.org/kabir.png".to_string(),
            speciality: "Dermatologist".to_string(),
            degree: "MD".to_string(),
            experience: "9 Years".to_string(),
            about: "Skin care.".to_string(),
            fees: 300,
            address: Address::default(),
        })
        .await
        .unwrap();

    let mut patients = Vec::new();
    for i in 0..20 {
        let user = db
            .create_user(NewUser {
                name: format!("Patient {}", i),
                email: Some(format!("patient{}@mail.test", i)),
                hashed_password: Some("not-a-real-hash".to_string()),
                phone: None,
                gender: None,
                dob: None,
            })
            .await
            .unwrap();
        patients.push(user.id);
    }
    (doctor.id, patients)
}

fn request(user_id: Uuid, doctor_id: Uuid, mode: BookingMode, h: u32, m: u32) -> BookingRequest {
    BookingRequest {
        user_id,
        doctor_id,
        slot_date: date(2025, 6, 3),
        slot_time: time(h, m),
        booking_mode: mode,
        description: String::new(),
        attachment_url: None,
    }
}

fn service(db: &Arc<dyn DatabaseService>, policy: ClinicPolicy) -> BookingService {
    booking_service(db.clone(), monday_morning(), policy)
}

#[tokio::test]
async fn concurrent_priority_requests_yield_one_booking() {
    let db: Arc<dyn DatabaseService> = Arc::new(MemoryDb::new());
    let (doctor_id, patients) = seed(&db).await;
    let booking = service(&db, ClinicPolicy::default());

    let attempts = patients.iter().map(|&user_id| {
        let booking = booking.clone();
        async move {
            booking
                .book(request(user_id, doctor_id, BookingMode::Priority, 19, 30))
                .await
        }
    });
    let results = join_all(attempts).await;

    let booked = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(PortError::Conflict(_))))
        .count();
    assert_eq!(booked, 1);
    assert_eq!(conflicts, patients.len() - 1);
}

#[tokio::test]
async fn concurrent_queue_requests_get_distinct_positions() {
    let db: Arc<dyn DatabaseService> = Arc::new(MemoryDb::new());
    let (doctor_id, patients) = seed(&db).await;
    let booking = service(&db, ClinicPolicy::default());

    let attempts = patients.iter().map(|&user_id| {
        let booking = booking.clone();
        tokio::spawn(async move {
            booking
                .book(request(user_id, doctor_id, BookingMode::Queue, 17, 0))
                .await
        })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let mut positions: Vec<u32> = results
        .iter()
        .filter_map(|r| r.as_ref().ok().map(|a| a.queue_position))
        .collect();
    positions.sort_unstable();
    assert_eq!(positions, (1..=15).collect::<Vec<_>>());
    assert_eq!(results.iter().filter(|r| r.is_err()).count(), 5);
}

#[tokio::test]
async fn cancelled_queue_position_is_reused() {
    let db: Arc<dyn DatabaseService> = Arc::new(MemoryDb::new());
    let (doctor_id, patients) = seed(&db).await;
    let booking = service(&db, ClinicPolicy::default());

    let mut booked = Vec::new();
    for &user_id in &patients[..3] {
        booked.push(
            booking
                .book(request(user_id, doctor_id, BookingMode::Queue, 10, 0))
                .await
                .unwrap(),
        );
    }
    booking
        .cancel_as_patient(patients[1], booked[1].id)
        .await
        .unwrap();
    // Cancelling twice is a no-op.
    booking
        .cancel_as_patient(patients[1], booked[1].id)
        .await
        .unwrap();

    let window = booking
        .queue_position(doctor_id, date(2025, 6, 3), time(10, 0))
        .await
        .unwrap();
    assert_eq!(window.booked, 2);
    assert_eq!(window.next_position, Some(2));

    let next = booking
        .book(request(patients[3], doctor_id, BookingMode::Queue, 10, 0))
        .await
        .unwrap();
    assert_eq!(next.queue_position, 2);
    assert_eq!(next.token().to_string(), "#030102");
}

#[tokio::test]
async fn reschedule_releases_the_old_slot() {
    let db: Arc<dyn DatabaseService> = Arc::new(MemoryDb::new());
    let (doctor_id, patients) = seed(&db).await;
    let booking = service(&db, ClinicPolicy::default());

    let original = booking
        .book(request(patients[0], doctor_id, BookingMode::Priority, 11, 0))
        .await
        .unwrap();

    let err = booking
        .reschedule(patients[1], original.id, date(2025, 6, 4), time(11, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, PortError::Forbidden(_)));

    let moved = booking
        .reschedule(patients[0], original.id, date(2025, 6, 4), time(11, 0))
        .await
        .unwrap();
    assert!(moved.rescheduled);
    assert_eq!(moved.slot_date, date(2025, 6, 4));

    // The old slot is free again for someone else.
    booking
        .book(request(patients[1], doctor_id, BookingMode::Priority, 11, 0))
        .await
        .unwrap();
}

#[tokio::test]
async fn walk_in_books_a_paid_queue_slot() {
    let db: Arc<dyn DatabaseService> = Arc::new(MemoryDb::new());
    let (doctor_id, _) = seed(&db).await;
    let booking = service(&db, ClinicPolicy::default());

    let appointment = booking
        .book_walk_in(WalkInRequest {
            name: "Walk-in".to_string(),
            phone: "9876543210".to_string(),
            email: None,
            gender: None,
            doctor_id,
            slot_date: date(2025, 6, 2),
            slot_time: time(12, 0),
            description: "Fever".to_string(),
            paid: true,
        })
        .await
        .unwrap();
    assert_eq!(appointment.booking_mode, BookingMode::Queue);
    assert_eq!(appointment.amount, 300);

    let dashboard = booking.doctor_dashboard(doctor_id).await.unwrap();
    assert_eq!(dashboard.earnings, 300);
    assert_eq!(dashboard.appointments, 1);

    // Walk-in patients have no password and cannot log in.
    assert!(db.get_user_credentials("walk-in").await.is_err());
}

#[tokio::test]
async fn first_day_hides_slots_that_already_started() {
    let db: Arc<dyn DatabaseService> = Arc::new(MemoryDb::new());
    let (doctor_id, _) = seed(&db).await;
    let noonish = date(2025, 6, 2).and_time(time(12, 10));
    let booking = booking_service(db.clone(), noonish, ClinicPolicy::default());

    let days = booking.available_slots(doctor_id).await.unwrap();
    assert_eq!(days.len(), 7);
    let today = &days[0];
    assert_eq!(today.slots[0].start.time(), time(12, 30));
    assert_eq!(today.slots[0].index, 6);

    let queues = booking.queue_slots(doctor_id).await.unwrap();
    let starts: Vec<_> = queues[0].windows.iter().map(|w| w.start.time()).collect();
    assert_eq!(starts, vec![time(15, 0), time(17, 0)]);
    assert_eq!(queues[1].windows.len(), 4);

    let err = booking
        .book(BookingRequest {
            slot_date: date(2025, 6, 2),
            ..request(Uuid::new_v4(), doctor_id, BookingMode::Queue, 12, 0)
        })
        .await
        .unwrap_err();
    assert!(matches!(err, PortError::Invalid(_)));
}

#[tokio::test]
async fn walk_in_joins_the_window_that_is_running() {
    let db: Arc<dyn DatabaseService> = Arc::new(MemoryDb::new());
    let (doctor_id, patients) = seed(&db).await;
    let half_past_ten = date(2025, 6, 2).and_time(time(10, 30));
    let booking = booking_service(db.clone(), half_past_ten, ClinicPolicy::default());

    let walk_in = |slot_time| WalkInRequest {
        name: "Walk-in".to_string(),
        phone: "9876543210".to_string(),
        email: None,
        gender: None,
        doctor_id,
        slot_date: date(2025, 6, 2),
        slot_time,
        description: String::new(),
        paid: false,
    };

    let appointment = booking.book_walk_in(walk_in(time(10, 0))).await.unwrap();
    assert_eq!(appointment.slot_time, time(10, 0));
    assert_eq!(appointment.queue_position, 1);
    assert_eq!(appointment.token().to_string(), "#020101");

    // Online patients still cannot pick a window that already started.
    let err = booking
        .book(BookingRequest {
            slot_date: date(2025, 6, 2),
            ..request(patients[0], doctor_id, BookingMode::Queue, 10, 0)
        })
        .await
        .unwrap_err();
    assert!(matches!(err, PortError::Invalid(_)));

    let late = booking_service(
        db.clone(),
        date(2025, 6, 2).and_time(time(12, 0)),
        ClinicPolicy::default(),
    );
    let err = late.book_walk_in(walk_in(time(10, 0))).await.unwrap_err();
    assert!(matches!(err, PortError::Invalid(_)));
}
