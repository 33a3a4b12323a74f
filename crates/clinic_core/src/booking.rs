//! crates/clinic_core/src/booking.rs
//!
//! The booking application service. It validates requests against the clinic
//! policy and the current state, then hands the actual slot claim to the storage
//! port, which performs it atomically.

use chrono::{NaiveDate, NaiveTime};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{
    AdminDashboard, Appointment, AppointmentFilter, AppointmentType, BookingMode, Doctor,
    DoctorDashboard, DoctorSnapshot, NewAppointment, NewUser, PatientSnapshot, User,
};
use crate::ports::{Clock, DatabaseService, PortError, PortResult};
use crate::schedule::{ClinicPolicy, DayQueue, DaySlots, QueueWindow};

/// How many appointments a dashboard lists.
const LATEST_APPOINTMENTS: usize = 5;

/// A patient's request for a slot.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub user_id: Uuid,
    pub doctor_id: Uuid,
    pub slot_date: NaiveDate,
    pub slot_time: NaiveTime,
    pub booking_mode: BookingMode,
    pub description: String,
    pub attachment_url: Option<String>,
}

/// A patient registered at the front desk and queued straight away.
#[derive(Debug, Clone)]
pub struct WalkInRequest {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub gender: Option<String>,
    pub doctor_id: Uuid,
    pub slot_date: NaiveDate,
    pub slot_time: NaiveTime,
    pub description: String,
    pub paid: bool,
}

#[derive(Clone)]
pub struct BookingService {
    db: Arc<dyn DatabaseService>,
    clock: Arc<dyn Clock>,
    policy: ClinicPolicy,
}

impl BookingService {
    pub fn new(db: Arc<dyn DatabaseService>, clock: Arc<dyn Clock>, policy: ClinicPolicy) -> Self {
        Self { db, clock, policy }
    }

    pub fn policy(&self) -> &ClinicPolicy {
        &self.policy
    }

    //=====================================================================================
    // Availability
    //=====================================================================================

    pub async fn available_slots(&self, doctor_id: Uuid) -> PortResult<Vec<DaySlots>> {
        self.db.get_doctor(doctor_id).await?;
        let now = self.clock.now();
        let (first, last) = self.policy.booking_window(now);
        let booked = self.db.booked_priority_slots(doctor_id, first, last).await?;
        Ok(self.policy.priority_schedule(now, &booked))
    }

    pub async fn queue_slots(&self, doctor_id: Uuid) -> PortResult<Vec<DayQueue>> {
        self.db.get_doctor(doctor_id).await?;
        let now = self.clock.now();
        let (first, last) = self.policy.booking_window(now);
        let occupancy = self.db.queue_occupancy(doctor_id, first, last).await?;
        Ok(self.policy.queue_schedule(now, &occupancy))
    }

    /// The position and token the next queue booking in this window would receive.
    pub async fn queue_position(
        &self,
        doctor_id: Uuid,
        slot_date: NaiveDate,
        slot_time: NaiveTime,
    ) -> PortResult<QueueWindow> {
        self.db.get_doctor(doctor_id).await?;
        let index = self.policy.classify(slot_time, BookingMode::Queue)?;
        let occupancy = self
            .db
            .queue_occupancy(doctor_id, slot_date, slot_date)
            .await?;
        let taken = occupancy
            .into_iter()
            .find(|o| o.date == slot_date && o.window_start == slot_time)
            .map(|o| o.taken_positions)
            .unwrap_or_default();
        Ok(self
            .policy
            .queue_window(slot_date, index, slot_date.and_time(slot_time), &taken))
    }

    //=====================================================================================
    // Booking
    //=====================================================================================

    pub async fn book(&self, request: BookingRequest) -> PortResult<Appointment> {
        let (doctor, slot_index) = self
            .check_slot(
                request.doctor_id,
                request.slot_date,
                request.slot_time,
                request.booking_mode,
            )
            .await?;
        let user = self.db.get_user(request.user_id).await?;

        let new = NewAppointment {
            user_id: user.id,
            doctor_id: doctor.id,
            patient: snapshot_patient(&user),
            doctor: snapshot_doctor(&doctor),
            slot_date: request.slot_date,
            slot_time: request.slot_time,
            slot_index,
            amount: self.policy.amount_for(doctor.fees, request.booking_mode),
            booking_mode: request.booking_mode,
            appointment_type: AppointmentType::Online,
            description: request.description,
            attachment_url: request.attachment_url,
            paid: false,
        };
        let appointment = self
            .db
            .reserve_appointment(new, self.policy.queue_capacity)
            .await?;
        info!(
            "Booked appointment {} with doctor {} on {} at {} ({}, token {})",
            appointment.id,
            appointment.doctor_id,
            appointment.slot_date,
            appointment.slot_time,
            appointment.booking_mode,
            appointment.token()
        );
        Ok(appointment)
    }

    /// Registers a walk-in patient and queues them in the requested window.
    pub async fn book_walk_in(&self, request: WalkInRequest) -> PortResult<Appointment> {
        let doctor = self.available_doctor(request.doctor_id).await?;
        let slot_index = self.policy.classify(request.slot_time, BookingMode::Queue)?;
        self.policy
            .ensure_joinable(self.clock.now(), request.slot_date, request.slot_time)?;

        let user = self
            .db
            .create_user(NewUser {
                name: request.name,
                email: request.email,
                hashed_password: None,
                phone: Some(request.phone),
                gender: request.gender,
                dob: None,
            })
            .await?;

        let new = NewAppointment {
            user_id: user.id,
            doctor_id: doctor.id,
            patient: snapshot_patient(&user),
            doctor: snapshot_doctor(&doctor),
            slot_date: request.slot_date,
            slot_time: request.slot_time,
            slot_index,
            amount: self.policy.amount_for(doctor.fees, BookingMode::Queue),
            booking_mode: BookingMode::Queue,
            appointment_type: AppointmentType::WalkIn,
            description: request.description,
            attachment_url: None,
            paid: request.paid,
        };
        let appointment = self
            .db
            .reserve_appointment(new, self.policy.queue_capacity)
            .await?;
        info!(
            "Walk-in patient {} queued at position {} (token {})",
            user.id,
            appointment.queue_position,
            appointment.token()
        );
        Ok(appointment)
    }

    /// Validates the doctor and the requested slot; returns the slot index.
    async fn check_slot(
        &self,
        doctor_id: Uuid,
        slot_date: NaiveDate,
        slot_time: NaiveTime,
        mode: BookingMode,
    ) -> PortResult<(Doctor, u32)> {
        let doctor = self.available_doctor(doctor_id).await?;
        let slot_index = self.policy.classify(slot_time, mode)?;
        self.policy
            .ensure_bookable(self.clock.now(), slot_date, slot_time)?;
        Ok((doctor, slot_index))
    }

    async fn available_doctor(&self, doctor_id: Uuid) -> PortResult<Doctor> {
        let doctor = self.db.get_doctor(doctor_id).await?;
        if !doctor.available {
            return Err(PortError::Conflict("Doctor not available".to_string()));
        }
        Ok(doctor)
    }

    //=====================================================================================
    // Lifecycle
    //=====================================================================================

    pub async fn cancel_as_patient(
        &self,
        user_id: Uuid,
        appointment_id: Uuid,
    ) -> PortResult<Appointment> {
        let appointment = self.db.get_appointment(appointment_id).await?;
        if appointment.user_id != user_id {
            warn!("User {} tried to cancel appointment {}", user_id, appointment_id);
            return Err(PortError::Forbidden("Unauthorized action".to_string()));
        }
        self.cancel(appointment).await
    }

    pub async fn cancel_as_doctor(
        &self,
        doctor_id: Uuid,
        appointment_id: Uuid,
    ) -> PortResult<Appointment> {
        let appointment = self.db.get_appointment(appointment_id).await?;
        if appointment.doctor_id != doctor_id {
            warn!("Doctor {} tried to cancel appointment {}", doctor_id, appointment_id);
            return Err(PortError::Forbidden("Unauthorized action".to_string()));
        }
        self.cancel(appointment).await
    }

    pub async fn cancel_as_admin(&self, appointment_id: Uuid) -> PortResult<Appointment> {
        let appointment = self.db.get_appointment(appointment_id).await?;
        self.cancel(appointment).await
    }

    async fn cancel(&self, appointment: Appointment) -> PortResult<Appointment> {
        if appointment.cancelled {
            return Ok(appointment);
        }
        if appointment.completed {
            return Err(PortError::Invalid(
                "A completed appointment cannot be cancelled".to_string(),
            ));
        }
        let cancelled = self.db.cancel_appointment(appointment.id).await?;
        info!("Cancelled appointment {}", cancelled.id);
        Ok(cancelled)
    }

    pub async fn complete(&self, doctor_id: Uuid, appointment_id: Uuid) -> PortResult<Appointment> {
        let appointment = self.db.get_appointment(appointment_id).await?;
        if appointment.doctor_id != doctor_id {
            return Err(PortError::Forbidden("Unauthorized action".to_string()));
        }
        if appointment.cancelled {
            return Err(PortError::Invalid(
                "A cancelled appointment cannot be completed".to_string(),
            ));
        }
        if appointment.completed {
            return Ok(appointment);
        }
        self.db.complete_appointment(appointment_id).await
    }

    /// Moves a patient's appointment to another slot of the same booking mode. Allowed once.
    pub async fn reschedule(
        &self,
        user_id: Uuid,
        appointment_id: Uuid,
        slot_date: NaiveDate,
        slot_time: NaiveTime,
    ) -> PortResult<Appointment> {
        let appointment = self.db.get_appointment(appointment_id).await?;
        if appointment.user_id != user_id {
            return Err(PortError::Forbidden("Unauthorized action".to_string()));
        }
        if appointment.rescheduled {
            return Err(PortError::Invalid(
                "Appointment already rescheduled once".to_string(),
            ));
        }
        if appointment.cancelled || appointment.completed {
            return Err(PortError::Invalid(
                "Only upcoming appointments can be rescheduled".to_string(),
            ));
        }

        let (_, slot_index) = self
            .check_slot(
                appointment.doctor_id,
                slot_date,
                slot_time,
                appointment.booking_mode,
            )
            .await?;
        let moved = self
            .db
            .reschedule_appointment(
                appointment_id,
                slot_date,
                slot_time,
                slot_index,
                self.policy.queue_capacity,
            )
            .await?;
        info!(
            "Rescheduled appointment {} to {} at {}",
            moved.id, moved.slot_date, moved.slot_time
        );
        Ok(moved)
    }

    //=====================================================================================
    // Listings and Dashboards
    //=====================================================================================

    pub async fn appointments_for_user(&self, user_id: Uuid) -> PortResult<Vec<Appointment>> {
        self.db
            .list_appointments(AppointmentFilter {
                user_id: Some(user_id),
                doctor_id: None,
            })
            .await
    }

    pub async fn appointments_for_doctor(&self, doctor_id: Uuid) -> PortResult<Vec<Appointment>> {
        self.db
            .list_appointments(AppointmentFilter {
                user_id: None,
                doctor_id: Some(doctor_id),
            })
            .await
    }

    pub async fn all_appointments(&self) -> PortResult<Vec<Appointment>> {
        self.db.list_appointments(AppointmentFilter::default()).await
    }

    pub async fn admin_dashboard(&self) -> PortResult<AdminDashboard> {
        let doctors = self.db.list_doctors().await?.len();
        let patients = self.db.count_users().await?;
        let appointments = self.all_appointments().await?;
        Ok(AdminDashboard {
            doctors,
            appointments: appointments.len(),
            patients,
            latest_appointments: appointments.into_iter().take(LATEST_APPOINTMENTS).collect(),
        })
    }

    pub async fn doctor_dashboard(&self, doctor_id: Uuid) -> PortResult<DoctorDashboard> {
        let appointments = self.appointments_for_doctor(doctor_id).await?;
        let earnings = appointments
            .iter()
            .filter(|a| a.is_active() && (a.completed || a.paid))
            .map(|a| i64::from(a.amount))
            .sum();
        let patients = appointments
            .iter()
            .map(|a| a.user_id)
            .collect::<HashSet<_>>()
            .len();
        Ok(DoctorDashboard {
            earnings,
            appointments: appointments.len(),
            patients,
            latest_appointments: appointments.into_iter().take(LATEST_APPOINTMENTS).collect(),
        })
    }
}

fn snapshot_patient(user: &User) -> PatientSnapshot {
    PatientSnapshot {
        name: user.name.clone(),
        email: user.email.clone(),
        phone: user.phone.clone(),
    }
}

fn snapshot_doctor(doctor: &Doctor) -> DoctorSnapshot {
    DoctorSnapshot {
        name: doctor.name.clone(),
        speciality: doctor.speciality.clone(),
        image: doctor.image.clone(),
    }
}
