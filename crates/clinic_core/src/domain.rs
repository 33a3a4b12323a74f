//! crates/clinic_core/src/domain.rs
//!
//! Defines the pure, core data structures for the clinic.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::ports::PortError;

//=========================================================================================
// People
//=========================================================================================

/// A two-line postal address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Address {
    pub line1: String,
    pub line2: String,
}

/// A patient. Walk-in patients registered at the desk have no email and cannot log in.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Address,
    pub gender: Option<String>,
    pub dob: Option<NaiveDate>,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Data needed to create a patient record.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: Option<String>,
    pub hashed_password: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub dob: Option<NaiveDate>,
}

/// Fields a patient may change on their own profile.
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub name: String,
    pub phone: String,
    pub address: Address,
    pub gender: String,
    pub dob: NaiveDate,
    pub image: Option<String>,
}

// Only used internally for login - contains sensitive data
#[derive(Debug, Clone)]
pub struct Credentials {
    pub id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

#[derive(Debug, Clone)]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub image: String,
    pub speciality: String,
    pub degree: String,
    pub experience: String,
    pub about: String,
    pub available: bool,
    pub fees: i32,
    pub address: Address,
    pub created_at: DateTime<Utc>,
}

/// Data needed to create a doctor; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewDoctor {
    pub name: String,
    pub email: String,
    pub hashed_password: String,
    pub image: String,
    pub speciality: String,
    pub degree: String,
    pub experience: String,
    pub about: String,
    pub fees: i32,
    pub address: Address,
}

/// Fields a doctor may change on their own profile.
#[derive(Debug, Clone)]
pub struct DoctorProfileUpdate {
    pub fees: i32,
    pub address: Address,
    pub available: bool,
}

//=========================================================================================
// Appointments
//=========================================================================================

/// How a patient entered the doctor's schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookingMode {
    /// First-come booking into a two-hour window, no extra fee.
    Queue,
    /// Paid booking of one specific half-hour slot.
    Priority,
}

impl BookingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingMode::Queue => "queue",
            BookingMode::Priority => "priority",
        }
    }
}

impl fmt::Display for BookingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingMode {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queue" => Ok(BookingMode::Queue),
            "priority" => Ok(BookingMode::Priority),
            other => Err(PortError::Invalid(format!("unknown booking mode '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentType {
    Online,
    WalkIn,
}

impl AppointmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentType::Online => "online",
            AppointmentType::WalkIn => "walk-in",
        }
    }
}

impl FromStr for AppointmentType {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(AppointmentType::Online),
            "walk-in" => Ok(AppointmentType::WalkIn),
            other => Err(PortError::Invalid(format!("unknown appointment type '{}'", other))),
        }
    }
}

/// Patient details copied onto the appointment when it is booked.
#[derive(Debug, Clone, Default)]
pub struct PatientSnapshot {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Doctor details copied onto the appointment when it is booked.
#[derive(Debug, Clone, Default)]
pub struct DoctorSnapshot {
    pub name: String,
    pub speciality: String,
    pub image: String,
}

#[derive(Debug, Clone)]
pub struct Appointment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub doctor_id: Uuid,
    pub patient: PatientSnapshot,
    pub doctor: DoctorSnapshot,
    pub slot_date: NaiveDate,
    /// Start of the half-hour slot (priority) or of the queue window (queue).
    pub slot_time: NaiveTime,
    /// 1-based index of the slot within the day's grid for its booking mode.
    pub slot_index: u32,
    pub amount: i32,
    pub booking_mode: BookingMode,
    pub queue_position: u32,
    pub appointment_type: AppointmentType,
    pub description: String,
    pub attachment_url: Option<String>,
    pub paid: bool,
    pub cancelled: bool,
    pub completed: bool,
    pub rescheduled: bool,
    pub booked_at: DateTime<Utc>,
}

impl Appointment {
    /// True while the appointment occupies its slot.
    pub fn is_active(&self) -> bool {
        !self.cancelled
    }
}

/// A reservation request handed to the storage port. The queue position is
/// assigned by the store inside its critical section.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub user_id: Uuid,
    pub doctor_id: Uuid,
    pub patient: PatientSnapshot,
    pub doctor: DoctorSnapshot,
    pub slot_date: NaiveDate,
    pub slot_time: NaiveTime,
    pub slot_index: u32,
    pub amount: i32,
    pub booking_mode: BookingMode,
    pub appointment_type: AppointmentType,
    pub description: String,
    pub attachment_url: Option<String>,
    pub paid: bool,
}

/// Restricts an appointment listing to one patient or one doctor.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppointmentFilter {
    pub user_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
}

/// Queue positions held by active bookings in one window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueOccupancy {
    pub date: NaiveDate,
    pub window_start: NaiveTime,
    pub taken_positions: Vec<u32>,
}

//=========================================================================================
// Articles
//=========================================================================================

#[derive(Debug, Clone)]
pub struct Article {
    pub id: Uuid,
    pub title: String,
    pub image_url: Option<String>,
    pub source: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub approved: bool,
    pub kind: String,
}

#[derive(Debug, Clone)]
pub struct NewArticle {
    pub title: String,
    pub image_url: Option<String>,
    pub source: String,
    pub url: String,
}

//=========================================================================================
// Authentication
//=========================================================================================

/// Who an auth session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Principal {
    Patient(Uuid),
    Doctor(Uuid),
    Admin,
}

impl Principal {
    pub fn role(&self) -> &'static str {
        match self {
            Principal::Patient(_) => "patient",
            Principal::Doctor(_) => "doctor",
            Principal::Admin => "admin",
        }
    }

    /// The id of the patient or doctor; admins have none.
    pub fn subject_id(&self) -> Option<Uuid> {
        match self {
            Principal::Patient(id) | Principal::Doctor(id) => Some(*id),
            Principal::Admin => None,
        }
    }

    pub fn from_parts(role: &str, subject_id: Option<Uuid>) -> Result<Self, PortError> {
        match (role, subject_id) {
            ("patient", Some(id)) => Ok(Principal::Patient(id)),
            ("doctor", Some(id)) => Ok(Principal::Doctor(id)),
            ("admin", None) => Ok(Principal::Admin),
            _ => Err(PortError::Unexpected(format!(
                "malformed auth session for role '{}'",
                role
            ))),
        }
    }
}

// Represents a login session handed out as an opaque header token
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub principal: Principal,
    pub expires_at: DateTime<Utc>,
}

//=========================================================================================
// Dashboards
//=========================================================================================

#[derive(Debug, Clone)]
pub struct AdminDashboard {
    pub doctors: usize,
    pub appointments: usize,
    pub patients: usize,
    pub latest_appointments: Vec<Appointment>,
}

#[derive(Debug, Clone)]
pub struct DoctorDashboard {
    pub earnings: i64,
    pub appointments: usize,
    pub patients: usize,
    pub latest_appointments: Vec<Appointment>,
}
