//! services/api/src/adapters/memory.rs
//!
//! An in-process implementation of the `DatabaseService` port. Used when no
//! `DATABASE_URL` is configured and by the test suite.
//!
//! Every table sits behind a single mutex, so checking a slot and claiming it
//! happen under the same guard.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clinic_core::domain::{
    Appointment, AppointmentFilter, Article, AuthSession, BookingMode, Credentials, Doctor,
    DoctorProfileUpdate, NewAppointment, NewArticle, NewDoctor, NewUser, Principal, ProfileUpdate,
    QueueOccupancy, User,
};
use clinic_core::ports::{DatabaseService, PortError, PortResult};
use clinic_core::schedule::lowest_free_position;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;
use uuid::Uuid;

struct StoredUser {
    user: User,
    hashed_password: Option<String>,
}

struct StoredDoctor {
    doctor: Doctor,
    hashed_password: String,
}

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, StoredUser>,
    doctors: HashMap<Uuid, StoredDoctor>,
    appointments: HashMap<Uuid, Appointment>,
    articles: HashMap<Uuid, Article>,
    sessions: HashMap<String, AuthSession>,
}

impl Tables {
    fn doctor(&self, doctor_id: Uuid) -> PortResult<&StoredDoctor> {
        self.doctors
            .get(&doctor_id)
            .ok_or_else(|| PortError::NotFound(format!("Doctor {} not found", doctor_id)))
    }

    fn doctor_mut(&mut self, doctor_id: Uuid) -> PortResult<&mut StoredDoctor> {
        self.doctors
            .get_mut(&doctor_id)
            .ok_or_else(|| PortError::NotFound(format!("Doctor {} not found", doctor_id)))
    }

    fn appointment_mut(&mut self, appointment_id: Uuid) -> PortResult<&mut Appointment> {
        self.appointments
            .get_mut(&appointment_id)
            .ok_or_else(|| PortError::NotFound(format!("Appointment {} not found", appointment_id)))
    }

    /// Same occupancy rules as the partial unique indexes of the SQL schema.
    fn claim_position(
        &self,
        doctor_id: Uuid,
        slot_date: NaiveDate,
        slot_time: NaiveTime,
        mode: BookingMode,
        queue_capacity: u32,
        exclude: Option<Uuid>,
    ) -> PortResult<u32> {
        let taken: Vec<u32> = self
            .appointments
            .values()
            .filter(|a| {
                a.is_active()
                    && a.doctor_id == doctor_id
                    && a.slot_date == slot_date
                    && a.slot_time == slot_time
                    && a.booking_mode == mode
                    && Some(a.id) != exclude
            })
            .map(|a| a.queue_position)
            .collect();

        match mode {
            BookingMode::Priority if taken.is_empty() => Ok(1),
            BookingMode::Priority => Err(PortError::Conflict("Slot already booked".to_string())),
            BookingMode::Queue => lowest_free_position(&taken, queue_capacity)
                .ok_or_else(|| PortError::Conflict("Queue is full for this slot".to_string())),
        }
    }
}

/// A `DatabaseService` that keeps everything in memory.
#[derive(Default)]
pub struct MemoryDb {
    tables: Mutex<Tables>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }
}

fn email_taken<'a>(mut emails: impl Iterator<Item = Option<&'a str>>, email: &str) -> bool {
    emails.any(|e| e.is_some_and(|e| e.eq_ignore_ascii_case(email)))
}

#[async_trait]
impl DatabaseService for MemoryDb {
    // --- Patients ---

    async fn create_user(&self, user: NewUser) -> PortResult<User> {
        let mut tables = self.tables.lock().await;
        if let Some(email) = user.email.as_deref() {
            if email_taken(tables.users.values().map(|u| u.user.email.as_deref()), email) {
                return Err(PortError::Conflict("Email already registered".to_string()));
            }
        }
        let stored = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            phone: user.phone,
            address: Default::default(),
            gender: user.gender,
            dob: user.dob,
            image: None,
            created_at: Utc::now(),
        };
        tables.users.insert(
            stored.id,
            StoredUser {
                user: stored.clone(),
                hashed_password: user.hashed_password,
            },
        );
        Ok(stored)
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        let tables = self.tables.lock().await;
        tables
            .users
            .get(&user_id)
            .map(|u| u.user.clone())
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    async fn get_user_credentials(&self, email: &str) -> PortResult<Credentials> {
        let tables = self.tables.lock().await;
        tables
            .users
            .values()
            .find_map(|u| match (&u.user.email, &u.hashed_password) {
                (Some(e), Some(hash)) if e.eq_ignore_ascii_case(email) => Some(Credentials {
                    id: u.user.id,
                    email: e.clone(),
                    hashed_password: hash.clone(),
                }),
                _ => None,
            })
            .ok_or_else(|| PortError::NotFound("User does not exist".to_string()))
    }

    async fn update_user_profile(&self, user_id: Uuid, update: ProfileUpdate) -> PortResult<User> {
        let mut tables = self.tables.lock().await;
        let stored = tables
            .users
            .get_mut(&user_id)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;
        let user = &mut stored.user;
        user.name = update.name;
        user.phone = Some(update.phone);
        user.address = update.address;
        user.gender = Some(update.gender);
        user.dob = Some(update.dob);
        if update.image.is_some() {
            user.image = update.image;
        }
        Ok(user.clone())
    }

    async fn count_users(&self) -> PortResult<usize> {
        Ok(self.tables.lock().await.users.len())
    }

    // --- Doctors ---

    async fn create_doctor(&self, doctor: NewDoctor) -> PortResult<Doctor> {
        let mut tables = self.tables.lock().await;
        if email_taken(
            tables.doctors.values().map(|d| Some(d.doctor.email.as_str())),
            &doctor.email,
        ) {
            return Err(PortError::Conflict(
                "A doctor with this email already exists".to_string(),
            ));
        }
        let stored = Doctor {
            id: Uuid::new_v4(),
            name: doctor.name,
            email: doctor.email,
            image: doctor.image,
            speciality: doctor.speciality,
            degree: doctor.degree,
            experience: doctor.experience,
            about: doctor.about,
            available: true,
            fees: doctor.fees,
            address: doctor.address,
            created_at: Utc::now(),
        };
        tables.doctors.insert(
            stored.id,
            StoredDoctor {
                doctor: stored.clone(),
                hashed_password: doctor.hashed_password,
            },
        );
        Ok(stored)
    }

    async fn get_doctor(&self, doctor_id: Uuid) -> PortResult<Doctor> {
        let tables = self.tables.lock().await;
        tables.doctor(doctor_id).map(|d| d.doctor.clone())
    }

    async fn get_doctor_credentials(&self, email: &str) -> PortResult<Credentials> {
        let tables = self.tables.lock().await;
        tables
            .doctors
            .values()
            .find(|d| d.doctor.email.eq_ignore_ascii_case(email))
            .map(|d| Credentials {
                id: d.doctor.id,
                email: d.doctor.email.clone(),
                hashed_password: d.hashed_password.clone(),
            })
            .ok_or_else(|| PortError::NotFound("Doctor does not exist".to_string()))
    }

    async fn list_doctors(&self) -> PortResult<Vec<Doctor>> {
        let tables = self.tables.lock().await;
        let mut doctors: Vec<Doctor> = tables.doctors.values().map(|d| d.doctor.clone()).collect();
        doctors.sort_by_key(|d| d.created_at);
        Ok(doctors)
    }

    async fn toggle_doctor_availability(&self, doctor_id: Uuid) -> PortResult<Doctor> {
        let mut tables = self.tables.lock().await;
        let stored = tables.doctor_mut(doctor_id)?;
        stored.doctor.available = !stored.doctor.available;
        Ok(stored.doctor.clone())
    }

    async fn update_doctor_profile(
        &self,
        doctor_id: Uuid,
        update: DoctorProfileUpdate,
    ) -> PortResult<Doctor> {
        let mut tables = self.tables.lock().await;
        let stored = tables.doctor_mut(doctor_id)?;
        stored.doctor.fees = update.fees;
        stored.doctor.address = update.address;
        stored.doctor.available = update.available;
        Ok(stored.doctor.clone())
    }

    // --- Appointments ---

    async fn reserve_appointment(
        &self,
        appointment: NewAppointment,
        queue_capacity: u32,
    ) -> PortResult<Appointment> {
        let mut tables = self.tables.lock().await;
        tables.doctor(appointment.doctor_id)?;
        let queue_position = tables.claim_position(
            appointment.doctor_id,
            appointment.slot_date,
            appointment.slot_time,
            appointment.booking_mode,
            queue_capacity,
            None,
        )?;

        let stored = Appointment {
            id: Uuid::new_v4(),
            user_id: appointment.user_id,
            doctor_id: appointment.doctor_id,
            patient: appointment.patient,
            doctor: appointment.doctor,
            slot_date: appointment.slot_date,
            slot_time: appointment.slot_time,
            slot_index: appointment.slot_index,
            amount: appointment.amount,
            booking_mode: appointment.booking_mode,
            queue_position,
            appointment_type: appointment.appointment_type,
            description: appointment.description,
            attachment_url: appointment.attachment_url,
            paid: appointment.paid,
            cancelled: false,
            completed: false,
            rescheduled: false,
            booked_at: Utc::now(),
        };
        tables.appointments.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn reschedule_appointment(
        &self,
        appointment_id: Uuid,
        slot_date: NaiveDate,
        slot_time: NaiveTime,
        slot_index: u32,
        queue_capacity: u32,
    ) -> PortResult<Appointment> {
        let mut tables = self.tables.lock().await;
        let (doctor_id, mode) = {
            let current = tables.appointment_mut(appointment_id)?;
            if current.rescheduled {
                return Err(PortError::Invalid(
                    "Appointment already rescheduled once".to_string(),
                ));
            }
            if current.cancelled {
                return Err(PortError::Invalid(
                    "Only upcoming appointments can be rescheduled".to_string(),
                ));
            }
            (current.doctor_id, current.booking_mode)
        };

        let queue_position = tables.claim_position(
            doctor_id,
            slot_date,
            slot_time,
            mode,
            queue_capacity,
            Some(appointment_id),
        )?;

        let moved = tables.appointment_mut(appointment_id)?;
        moved.slot_date = slot_date;
        moved.slot_time = slot_time;
        moved.slot_index = slot_index;
        moved.queue_position = queue_position;
        moved.rescheduled = true;
        Ok(moved.clone())
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> PortResult<Appointment> {
        let tables = self.tables.lock().await;
        tables
            .appointments
            .get(&appointment_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Appointment {} not found", appointment_id)))
    }

    async fn list_appointments(&self, filter: AppointmentFilter) -> PortResult<Vec<Appointment>> {
        let tables = self.tables.lock().await;
        let mut appointments: Vec<Appointment> = tables
            .appointments
            .values()
            .filter(|a| filter.user_id.map_or(true, |id| a.user_id == id))
            .filter(|a| filter.doctor_id.map_or(true, |id| a.doctor_id == id))
            .cloned()
            .collect();
        appointments.sort_by(|a, b| b.booked_at.cmp(&a.booked_at));
        Ok(appointments)
    }

    async fn cancel_appointment(&self, appointment_id: Uuid) -> PortResult<Appointment> {
        let mut tables = self.tables.lock().await;
        let appointment = tables.appointment_mut(appointment_id)?;
        appointment.cancelled = true;
        Ok(appointment.clone())
    }

    async fn complete_appointment(&self, appointment_id: Uuid) -> PortResult<Appointment> {
        let mut tables = self.tables.lock().await;
        let appointment = tables.appointment_mut(appointment_id)?;
        if appointment.cancelled {
            return Err(PortError::NotFound(format!(
                "Active appointment {} not found",
                appointment_id
            )));
        }
        appointment.completed = true;
        Ok(appointment.clone())
    }

    async fn booked_priority_slots(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> PortResult<Vec<(NaiveDate, NaiveTime)>> {
        let tables = self.tables.lock().await;
        let mut slots: Vec<(NaiveDate, NaiveTime)> = tables
            .appointments
            .values()
            .filter(|a| {
                a.is_active()
                    && a.doctor_id == doctor_id
                    && a.booking_mode == BookingMode::Priority
                    && a.slot_date >= from
                    && a.slot_date <= to
            })
            .map(|a| (a.slot_date, a.slot_time))
            .collect();
        slots.sort();
        Ok(slots)
    }

    async fn queue_occupancy(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> PortResult<Vec<QueueOccupancy>> {
        let tables = self.tables.lock().await;
        let mut windows: BTreeMap<(NaiveDate, NaiveTime), Vec<u32>> = BTreeMap::new();
        for a in tables.appointments.values().filter(|a| {
            a.is_active()
                && a.doctor_id == doctor_id
                && a.booking_mode == BookingMode::Queue
                && a.slot_date >= from
                && a.slot_date <= to
        }) {
            windows
                .entry((a.slot_date, a.slot_time))
                .or_default()
                .push(a.queue_position);
        }
        Ok(windows
            .into_iter()
            .map(|((date, window_start), mut taken_positions)| {
                taken_positions.sort_unstable();
                QueueOccupancy {
                    date,
                    window_start,
                    taken_positions,
                }
            })
            .collect())
    }

    // --- Articles ---

    async fn create_article(&self, article: NewArticle) -> PortResult<Article> {
        let mut tables = self.tables.lock().await;
        let stored = Article {
            id: Uuid::new_v4(),
            title: article.title,
            image_url: article.image_url,
            source: article.source,
            url: article.url,
            published_at: Utc::now(),
            approved: true,
            kind: "curated".to_string(),
        };
        tables.articles.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn list_articles(&self, approved_only: bool) -> PortResult<Vec<Article>> {
        let tables = self.tables.lock().await;
        let mut articles: Vec<Article> = tables
            .articles
            .values()
            .filter(|a| a.approved || !approved_only)
            .cloned()
            .collect();
        articles.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(articles)
    }

    async fn set_article_approval(&self, article_id: Uuid, approved: bool) -> PortResult<Article> {
        let mut tables = self.tables.lock().await;
        let article = tables
            .articles
            .get_mut(&article_id)
            .ok_or_else(|| PortError::NotFound(format!("Article {} not found", article_id)))?;
        article.approved = approved;
        Ok(article.clone())
    }

    // --- Auth Sessions ---

    async fn create_auth_session(
        &self,
        session_id: &str,
        principal: Principal,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let mut tables = self.tables.lock().await;
        tables.sessions.insert(
            session_id.to_string(),
            AuthSession {
                id: session_id.to_string(),
                principal,
                expires_at,
            },
        );
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Principal> {
        let tables = self.tables.lock().await;
        tables
            .sessions
            .get(session_id)
            .filter(|s| s.expires_at > Utc::now())
            .map(|s| s.principal)
            .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.tables.lock().await.sessions.remove(session_id);
        Ok(())
    }

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> PortResult<u64> {
        let mut tables = self.tables.lock().await;
        let before = tables.sessions.len();
        tables.sessions.retain(|_, s| s.expires_at > now);
        Ok((before - tables.sessions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinic_core::domain::{Address, AppointmentType, DoctorSnapshot, PatientSnapshot};
    use std::sync::Arc;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 3).unwrap()
    }

    fn time(hour: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, 0, 0).unwrap()
    }

    async fn seed_doctor(db: &MemoryDb) -> Doctor {
        db.create_doctor(NewDoctor {
            name: "Dr. Asha Rao".to_string(),
            email: "asha@clinic.test".to_string(),
            hashed_password: "hash".to_string(),
            image: "https://img.test/asha.png".to_string(),
            speciality: "General physician".to_string(),
            degree: "MBBS".to_string(),
            experience: "4 Years".to_string(),
            about: "".to_string(),
            fees: 300,
            address: Address::default(),
        })
        .await
        .unwrap()
    }

    fn request(doctor_id: Uuid, mode: BookingMode, hour: u32) -> NewAppointment {
        NewAppointment {
            user_id: Uuid::new_v4(),
            doctor_id,
            patient: PatientSnapshot::default(),
            doctor: DoctorSnapshot::default(),
            slot_date: date(),
            slot_time: time(hour),
            slot_index: 1,
            amount: 300,
            booking_mode: mode,
            appointment_type: AppointmentType::Online,
            description: String::new(),
            attachment_url: None,
            paid: false,
        }
    }

    #[tokio::test]
    async fn concurrent_priority_bookings_yield_one_winner() {
        let db = Arc::new(MemoryDb::new());
        let doctor = seed_doctor(&db).await;

        let attempts = (0..20).map(|_| {
            let db = db.clone();
            let req = request(doctor.id, BookingMode::Priority, 10);
            tokio::spawn(async move { db.reserve_appointment(req, 15).await })
        });
        let mut won = 0;
        let mut conflicts = 0;
        for handle in attempts.collect::<Vec<_>>() {
            match handle.await.unwrap() {
                Ok(_) => won += 1,
                Err(PortError::Conflict(_)) => conflicts += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(won, 1);
        assert_eq!(conflicts, 19);
    }

    #[tokio::test]
    async fn concurrent_queue_bookings_respect_capacity_and_distinct_positions() {
        let db = Arc::new(MemoryDb::new());
        let doctor = seed_doctor(&db).await;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let db = db.clone();
                let req = request(doctor.id, BookingMode::Queue, 12);
                tokio::spawn(async move { db.reserve_appointment(req, 5).await })
            })
            .collect();
        let mut positions = Vec::new();
        for handle in handles {
            if let Ok(appointment) = handle.await.unwrap() {
                positions.push(appointment.queue_position);
            }
        }
        positions.sort_unstable();
        assert_eq!(positions, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn cancelling_releases_the_slot() {
        let db = MemoryDb::new();
        let doctor = seed_doctor(&db).await;

        let first = db
            .reserve_appointment(request(doctor.id, BookingMode::Priority, 11), 15)
            .await
            .unwrap();
        assert!(db
            .reserve_appointment(request(doctor.id, BookingMode::Priority, 11), 15)
            .await
            .is_err());

        db.cancel_appointment(first.id).await.unwrap();
        let second = db
            .reserve_appointment(request(doctor.id, BookingMode::Priority, 11), 15)
            .await
            .unwrap();
        assert_ne!(first.id, second.id);

        let booked = db.booked_priority_slots(doctor.id, date(), date()).await.unwrap();
        assert_eq!(booked, vec![(date(), time(11))]);
    }

    #[tokio::test]
    async fn reschedule_moves_once_and_frees_old_position() {
        let db = MemoryDb::new();
        let doctor = seed_doctor(&db).await;

        let a = db
            .reserve_appointment(request(doctor.id, BookingMode::Queue, 10), 15)
            .await
            .unwrap();
        let b = db
            .reserve_appointment(request(doctor.id, BookingMode::Queue, 10), 15)
            .await
            .unwrap();
        assert_eq!((a.queue_position, b.queue_position), (1, 2));

        let moved = db
            .reschedule_appointment(a.id, date(), time(15), 3, 15)
            .await
            .unwrap();
        assert!(moved.rescheduled);
        assert_eq!(moved.queue_position, 1);
        assert_eq!(moved.slot_time, time(15));

        let occupancy = db.queue_occupancy(doctor.id, date(), date()).await.unwrap();
        let window = |hour, positions| QueueOccupancy {
            date: date(),
            window_start: time(hour),
            taken_positions: positions,
        };
        assert_eq!(occupancy, vec![window(10, vec![2]), window(15, vec![1])]);

        let again = db.reschedule_appointment(a.id, date(), time(17), 4, 15).await;
        assert!(matches!(again, Err(PortError::Invalid(_))));
    }

    #[tokio::test]
    async fn expired_sessions_are_rejected_and_purged() {
        let db = MemoryDb::new();
        let now = Utc::now();
        db.create_auth_session("live", Principal::Admin, now + chrono::Duration::hours(1))
            .await
            .unwrap();
        db.create_auth_session("stale", Principal::Admin, now - chrono::Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(db.validate_auth_session("live").await.unwrap(), Principal::Admin);
        assert!(matches!(
            db.validate_auth_session("stale").await,
            Err(PortError::Unauthorized)
        ));
        assert_eq!(db.purge_expired_sessions(now).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_emails_conflict_case_insensitively() {
        let db = MemoryDb::new();
        let new_user = |email: &str| NewUser {
            name: "Kiran".to_string(),
            email: Some(email.to_string()),
            hashed_password: Some("hash".to_string()),
            phone: None,
            gender: None,
            dob: None,
        };
        db.create_user(new_user("kiran@mail.test")).await.unwrap();
        assert!(matches!(
            db.create_user(new_user("Kiran@Mail.test")).await,
            Err(PortError::Conflict(_))
        ));
    }
}
