//! services/api/src/web/user.rs
//!
//! Patient endpoints: profile, booking, and the appointment list.
//! Every route here sits behind `require_patient`.

use crate::web::middleware::PatientId;
use crate::web::response::{
    appointment_views, message, ok, AddressView, AppointmentListResponse, AppointmentView, Body,
    BookingModeDto, DayQueueView, DaySlotsView, HandlerResult, HttpError, MessageBody,
    QueueWindowView, Success, UserView,
};
use crate::web::state::AppState;
use axum::{extract::State, Extension, Json};
use chrono::{NaiveDate, NaiveTime};
use clinic_core::domain::ProfileUpdate;
use clinic_core::BookingRequest;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub user_data: UserView,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub address: AddressView,
    pub gender: Option<String>,
    pub dob: Option<NaiveDate>,
    pub image: Option<String>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookAppointmentRequest {
    pub doc_id: Uuid,
    pub slot_date: NaiveDate,
    pub slot_time: NaiveTime,
    pub booking_mode: BookingModeDto,
    #[serde(default)]
    pub description: String,
    pub attachment_url: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct AppointmentResponse {
    pub message: String,
    pub appointment: AppointmentView,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentIdRequest {
    pub appointment_id: Uuid,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleRequest {
    pub appointment_id: Uuid,
    pub slot_date: NaiveDate,
    pub slot_time: NaiveTime,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DoctorIdRequest {
    #[serde(alias = "doctorId")]
    pub doc_id: Uuid,
}

#[derive(Serialize, ToSchema)]
pub struct AvailableSlotsResponse {
    pub days: Vec<DaySlotsView>,
}

#[derive(Serialize, ToSchema)]
pub struct QueueSlotsResponse {
    pub days: Vec<DayQueueView>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueuePositionRequest {
    pub doc_id: Uuid,
    pub slot_date: NaiveDate,
    pub slot_time: NaiveTime,
}

#[derive(Serialize, ToSchema)]
pub struct QueuePositionResponse {
    pub window: QueueWindowView,
}

fn required(field: Option<String>) -> Option<String> {
    field.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

//=========================================================================================
// Profile
//=========================================================================================

/// GET /api/user/get-profile
#[utoipa::path(
    get,
    path = "/api/user/get-profile",
    responses(
        (status = 200, description = "The patient's profile", body = Success<ProfileResponse>),
        (status = 401, description = "Missing or invalid token")
    ),
    params(("token" = String, Header, description = "Patient session token"))
)]
pub async fn get_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(PatientId(user_id)): Extension<PatientId>,
) -> HandlerResult<Json<Success<ProfileResponse>>> {
    let user = state.db.get_user(user_id).await?;
    Ok(ok(ProfileResponse {
        user_data: user.into(),
    }))
}

/// POST /api/user/update-profile
#[utoipa::path(
    post,
    path = "/api/user/update-profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = Success<MessageBody>),
        (status = 400, description = "Name, phone, gender or date of birth missing")
    ),
    params(("token" = String, Header, description = "Patient session token"))
)]
pub async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(PatientId(user_id)): Extension<PatientId>,
    Body(req): Body<UpdateProfileRequest>,
) -> HandlerResult<Json<Success<MessageBody>>> {
    let (Some(name), Some(phone), Some(gender), Some(dob)) = (
        required(req.name),
        required(req.phone),
        required(req.gender),
        req.dob,
    ) else {
        return Err(HttpError::bad_request("Data Missing"));
    };
    if let Some(image) = req.image.as_deref() {
        if !state.validators.is_http_url(image) {
            return Err(HttpError::bad_request("Image must be an http(s) URL"));
        }
    }

    state
        .db
        .update_user_profile(
            user_id,
            ProfileUpdate {
                name,
                phone,
                address: req.address.into(),
                gender,
                dob,
                image: req.image,
            },
        )
        .await?;
    Ok(message("Profile Updated"))
}

//=========================================================================================
// Booking
//=========================================================================================

/// POST /api/user/book-appointment
#[utoipa::path(
    post,
    path = "/api/user/book-appointment",
    request_body = BookAppointmentRequest,
    responses(
        (status = 200, description = "Appointment booked", body = Success<AppointmentResponse>),
        (status = 400, description = "Slot is off the grid or outside the booking window"),
        (status = 404, description = "Doctor not found"),
        (status = 409, description = "Slot taken, queue full, or doctor unavailable")
    ),
    params(("token" = String, Header, description = "Patient session token"))
)]
pub async fn book_appointment_handler(
    State(state): State<Arc<AppState>>,
    Extension(PatientId(user_id)): Extension<PatientId>,
    Body(req): Body<BookAppointmentRequest>,
) -> HandlerResult<Json<Success<AppointmentResponse>>> {
    if let Some(url) = req.attachment_url.as_deref() {
        if !state.validators.is_http_url(url) {
            return Err(HttpError::bad_request("Attachment must be an http(s) URL"));
        }
    }

    let appointment = state
        .booking
        .book(BookingRequest {
            user_id,
            doctor_id: req.doc_id,
            slot_date: req.slot_date,
            slot_time: req.slot_time,
            booking_mode: req.booking_mode.into(),
            description: req.description.trim().to_string(),
            attachment_url: req.attachment_url,
        })
        .await?;
    info!(appointment_id = %appointment.id, token = %appointment.token(), "Appointment booked");

    Ok(ok(AppointmentResponse {
        message: "Appointment Booked".to_string(),
        appointment: appointment.into(),
    }))
}

/// GET /api/user/appointments
#[utoipa::path(
    get,
    path = "/api/user/appointments",
    responses(
        (
            status = 200,
            description = "The patient's appointments, newest first",
            body = Success<AppointmentListResponse>
        )
    ),
    params(("token" = String, Header, description = "Patient session token"))
)]
pub async fn list_appointments_handler(
    State(state): State<Arc<AppState>>,
    Extension(PatientId(user_id)): Extension<PatientId>,
) -> HandlerResult<Json<Success<AppointmentListResponse>>> {
    let appointments = state.booking.appointments_for_user(user_id).await?;
    Ok(ok(AppointmentListResponse {
        appointments: appointment_views(appointments),
    }))
}

/// POST /api/user/cancel-appointment
#[utoipa::path(
    post,
    path = "/api/user/cancel-appointment",
    request_body = AppointmentIdRequest,
    responses(
        (status = 200, description = "Appointment cancelled", body = Success<MessageBody>),
        (status = 403, description = "Appointment belongs to another patient"),
        (status = 404, description = "Appointment not found")
    ),
    params(("token" = String, Header, description = "Patient session token"))
)]
pub async fn cancel_appointment_handler(
    State(state): State<Arc<AppState>>,
    Extension(PatientId(user_id)): Extension<PatientId>,
    Body(req): Body<AppointmentIdRequest>,
) -> HandlerResult<Json<Success<MessageBody>>> {
    state
        .booking
        .cancel_as_patient(user_id, req.appointment_id)
        .await?;
    Ok(message("Appointment Cancelled"))
}

/// POST /api/user/reschedule-appointment
#[utoipa::path(
    post,
    path = "/api/user/reschedule-appointment",
    request_body = RescheduleRequest,
    responses(
        (status = 200, description = "Appointment moved", body = Success<AppointmentResponse>),
        (status = 400, description = "Already rescheduled, not upcoming, or invalid slot"),
        (status = 409, description = "New slot is taken")
    ),
    params(("token" = String, Header, description = "Patient session token"))
)]
pub async fn reschedule_appointment_handler(
    State(state): State<Arc<AppState>>,
    Extension(PatientId(user_id)): Extension<PatientId>,
    Body(req): Body<RescheduleRequest>,
) -> HandlerResult<Json<Success<AppointmentResponse>>> {
    let appointment = state
        .booking
        .reschedule(user_id, req.appointment_id, req.slot_date, req.slot_time)
        .await?;
    Ok(ok(AppointmentResponse {
        message: "Appointment Rescheduled".to_string(),
        appointment: appointment.into(),
    }))
}

//=========================================================================================
// Schedules
//=========================================================================================

/// POST /api/user/get-available-slots - Free priority slots over the booking window
#[utoipa::path(
    post,
    path = "/api/user/get-available-slots",
    request_body = DoctorIdRequest,
    responses(
        (
            status = 200,
            description = "Free priority slots per day",
            body = Success<AvailableSlotsResponse>
        ),
        (status = 404, description = "Doctor not found")
    ),
    params(("token" = String, Header, description = "Patient session token"))
)]
pub async fn available_slots_handler(
    State(state): State<Arc<AppState>>,
    Body(req): Body<DoctorIdRequest>,
) -> HandlerResult<Json<Success<AvailableSlotsResponse>>> {
    let days = state.booking.available_slots(req.doc_id).await?;
    Ok(ok(AvailableSlotsResponse {
        days: days.into_iter().map(DaySlotsView::from).collect(),
    }))
}

/// POST /api/user/get-queue-slots - Queue windows and their occupancy
#[utoipa::path(
    post,
    path = "/api/user/get-queue-slots",
    request_body = DoctorIdRequest,
    responses(
        (status = 200, description = "Queue windows per day", body = Success<QueueSlotsResponse>),
        (status = 404, description = "Doctor not found")
    ),
    params(("token" = String, Header, description = "Patient session token"))
)]
pub async fn queue_slots_handler(
    State(state): State<Arc<AppState>>,
    Body(req): Body<DoctorIdRequest>,
) -> HandlerResult<Json<Success<QueueSlotsResponse>>> {
    let days = state.booking.queue_slots(req.doc_id).await?;
    Ok(ok(QueueSlotsResponse {
        days: days.into_iter().map(DayQueueView::from).collect(),
    }))
}

/// POST /api/user/get-queue-position - The position the next queue booking would get
#[utoipa::path(
    post,
    path = "/api/user/get-queue-position",
    request_body = QueuePositionRequest,
    responses(
        (
            status = 200,
            description = "Window occupancy and next position",
            body = Success<QueuePositionResponse>
        ),
        (status = 400, description = "Time is not a queue window"),
        (status = 404, description = "Doctor not found")
    ),
    params(("token" = String, Header, description = "Patient session token"))
)]
pub async fn queue_position_handler(
    State(state): State<Arc<AppState>>,
    Body(req): Body<QueuePositionRequest>,
) -> HandlerResult<Json<Success<QueuePositionResponse>>> {
    let window = state
        .booking
        .queue_position(req.doc_id, req.slot_date, req.slot_time)
        .await?;
    Ok(ok(QueuePositionResponse {
        window: window.into(),
    }))
}
