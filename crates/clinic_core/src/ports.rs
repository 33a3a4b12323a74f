//! crates/clinic_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or clocks.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Appointment, AppointmentFilter, Article, Credentials, Doctor, DoctorProfileUpdate,
    NewAppointment, NewArticle, NewDoctor, NewUser, Principal, ProfileUpdate, QueueOccupancy,
    User,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid request: {0}")]
    Invalid(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Patients ---
    /// Fails with `Conflict` when the email is already registered.
    async fn create_user(&self, user: NewUser) -> PortResult<User>;

    async fn get_user(&self, user_id: Uuid) -> PortResult<User>;

    async fn get_user_credentials(&self, email: &str) -> PortResult<Credentials>;

    async fn update_user_profile(&self, user_id: Uuid, update: ProfileUpdate) -> PortResult<User>;

    async fn count_users(&self) -> PortResult<usize>;

    // --- Doctors ---
    async fn create_doctor(&self, doctor: NewDoctor) -> PortResult<Doctor>;

    async fn get_doctor(&self, doctor_id: Uuid) -> PortResult<Doctor>;

    async fn get_doctor_credentials(&self, email: &str) -> PortResult<Credentials>;

    async fn list_doctors(&self) -> PortResult<Vec<Doctor>>;

    /// Flips the availability flag in one step and returns the updated doctor.
    async fn toggle_doctor_availability(&self, doctor_id: Uuid) -> PortResult<Doctor>;

    async fn update_doctor_profile(
        &self,
        doctor_id: Uuid,
        update: DoctorProfileUpdate,
    ) -> PortResult<Doctor>;

    // --- Appointments ---
    /// Atomically claims the requested slot and stores the appointment.
    ///
    /// Priority bookings fail with `Conflict` if another active priority booking
    /// holds the same doctor/date/time. Queue bookings receive the lowest free
    /// position in `1..=queue_capacity` and fail with `Conflict` when the window is full.
    async fn reserve_appointment(
        &self,
        appointment: NewAppointment,
        queue_capacity: u32,
    ) -> PortResult<Appointment>;

    /// Atomically moves an active appointment to a new slot and marks it rescheduled.
    /// Same occupancy rules as `reserve_appointment`; fails with `Invalid` if the
    /// appointment was already rescheduled.
    async fn reschedule_appointment(
        &self,
        appointment_id: Uuid,
        slot_date: NaiveDate,
        slot_time: NaiveTime,
        slot_index: u32,
        queue_capacity: u32,
    ) -> PortResult<Appointment>;

    async fn get_appointment(&self, appointment_id: Uuid) -> PortResult<Appointment>;

    /// Newest bookings first.
    async fn list_appointments(&self, filter: AppointmentFilter) -> PortResult<Vec<Appointment>>;

    async fn cancel_appointment(&self, appointment_id: Uuid) -> PortResult<Appointment>;

    async fn complete_appointment(&self, appointment_id: Uuid) -> PortResult<Appointment>;

    /// Start times of active priority bookings for the doctor in `[from, to]`.
    async fn booked_priority_slots(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> PortResult<Vec<(NaiveDate, NaiveTime)>>;

    /// Active queue bookings per window for the doctor in `[from, to]`.
    async fn queue_occupancy(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> PortResult<Vec<QueueOccupancy>>;

    // --- Articles ---
    async fn create_article(&self, article: NewArticle) -> PortResult<Article>;

    /// Newest first.
    async fn list_articles(&self, approved_only: bool) -> PortResult<Vec<Article>>;

    async fn set_article_approval(&self, article_id: Uuid, approved: bool) -> PortResult<Article>;

    // --- Auth Sessions ---
    async fn create_auth_session(
        &self,
        session_id: &str,
        principal: Principal,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Fails with `Unauthorized` for unknown or expired sessions.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Principal>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    /// Removes every session that expired before `now`; returns how many were removed.
    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> PortResult<u64>;
}

/// Supplies the current wall-clock time in the clinic's local time zone.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// The real clock, shifted by the clinic's fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.offset).naive_local()
    }
}
