//! services/api/src/web/admin.rs
//!
//! Admin-only endpoints. Every route here sits behind `require_admin`.

use crate::web::auth::hash_password;
use crate::web::doctor::DoctorListResponse;
use crate::web::response::{
    appointment_views, message, ok, AddressView, AdminDashboardView, AppointmentListResponse,
    Body, DoctorView, HandlerResult, HttpError, MessageBody, Success,
};
use crate::web::state::AppState;
use crate::web::user::{AppointmentIdRequest, AppointmentResponse, DoctorIdRequest};
use axum::{extract::State, Json};
use chrono::{NaiveDate, NaiveTime};
use clinic_core::domain::NewDoctor;
use clinic_core::WalkInRequest;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Deserialize, ToSchema)]
pub struct AddDoctorRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub image: String,
    pub speciality: String,
    pub degree: String,
    pub experience: String,
    pub about: String,
    pub fees: i32,
    #[serde(default)]
    pub address: AddressView,
}

#[derive(Serialize, ToSchema)]
pub struct AddDoctorResponse {
    pub message: String,
    pub doctor: DoctorView,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminDashboardResponse {
    pub dash_data: AdminDashboardView,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddPatientRequest {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub gender: Option<String>,
    pub doc_id: Uuid,
    pub slot_date: NaiveDate,
    pub slot_time: NaiveTime,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub payment: bool,
}

//=========================================================================================
// Doctors
//=========================================================================================

/// POST /api/admin/add-doctor
#[utoipa::path(
    post,
    path = "/api/admin/add-doctor",
    request_body = AddDoctorRequest,
    responses(
        (status = 200, description = "Doctor added", body = Success<AddDoctorResponse>),
        (status = 400, description = "Missing or invalid details"),
        (status = 409, description = "Email already registered")
    ),
    params(("atoken" = String, Header, description = "Admin session token"))
)]
pub async fn add_doctor_handler(
    State(state): State<Arc<AppState>>,
    Body(req): Body<AddDoctorRequest>,
) -> HandlerResult<Json<Success<AddDoctorResponse>>> {
    let email = req.email.trim().to_lowercase();
    let text_fields = [
        &req.name,
        &req.speciality,
        &req.degree,
        &req.experience,
        &req.about,
    ];
    if email.is_empty() || text_fields.iter().any(|f| f.trim().is_empty()) {
        return Err(HttpError::bad_request("Missing Details"));
    }
    if !state.validators.is_email(&email) {
        return Err(HttpError::bad_request("Please enter a valid email"));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(HttpError::bad_request("Please enter a strong password"));
    }
    if req.fees < 0 {
        return Err(HttpError::bad_request("Fees cannot be negative"));
    }
    if !state.validators.is_http_url(&req.image) {
        return Err(HttpError::bad_request("Image must be an http(s) URL"));
    }

    let hashed_password = hash_password(&req.password)?;
    let doctor = state
        .db
        .create_doctor(NewDoctor {
            name: req.name.trim().to_string(),
            email,
            hashed_password,
            image: req.image,
            speciality: req.speciality.trim().to_string(),
            degree: req.degree.trim().to_string(),
            experience: req.experience.trim().to_string(),
            about: req.about.trim().to_string(),
            fees: req.fees,
            address: req.address.into(),
        })
        .await?;
    info!(doctor_id = %doctor.id, "Doctor added");

    Ok(ok(AddDoctorResponse {
        message: "Doctor Added".to_string(),
        doctor: doctor.into(),
    }))
}

/// POST /api/admin/all-doctors
#[utoipa::path(
    post,
    path = "/api/admin/all-doctors",
    responses((status = 200, description = "All doctors", body = Success<DoctorListResponse>)),
    params(("atoken" = String, Header, description = "Admin session token"))
)]
pub async fn all_doctors_handler(
    State(state): State<Arc<AppState>>,
) -> HandlerResult<Json<Success<DoctorListResponse>>> {
    let doctors = state.db.list_doctors().await?;
    Ok(ok(DoctorListResponse {
        doctors: doctors.into_iter().map(DoctorView::from).collect(),
    }))
}

/// POST /api/admin/change-availability - Flip a doctor's availability flag
#[utoipa::path(
    post,
    path = "/api/admin/change-availability",
    request_body = DoctorIdRequest,
    responses(
        (status = 200, description = "Availability changed", body = Success<MessageBody>),
        (status = 404, description = "Doctor not found")
    ),
    params(("atoken" = String, Header, description = "Admin session token"))
)]
pub async fn change_availability_handler(
    State(state): State<Arc<AppState>>,
    Body(req): Body<DoctorIdRequest>,
) -> HandlerResult<Json<Success<MessageBody>>> {
    let doctor = state.db.toggle_doctor_availability(req.doc_id).await?;
    info!(doctor_id = %doctor.id, available = doctor.available, "Availability changed");
    Ok(message("Availability Changed"))
}

//=========================================================================================
// Appointments
//=========================================================================================

/// GET /api/admin/appointments
#[utoipa::path(
    get,
    path = "/api/admin/appointments",
    responses(
        (
            status = 200,
            description = "All appointments, newest first",
            body = Success<AppointmentListResponse>
        )
    ),
    params(("atoken" = String, Header, description = "Admin session token"))
)]
pub async fn all_appointments_handler(
    State(state): State<Arc<AppState>>,
) -> HandlerResult<Json<Success<AppointmentListResponse>>> {
    let appointments = state.booking.all_appointments().await?;
    Ok(ok(AppointmentListResponse {
        appointments: appointment_views(appointments),
    }))
}

/// POST /api/admin/cancel-appointment
#[utoipa::path(
    post,
    path = "/api/admin/cancel-appointment",
    request_body = AppointmentIdRequest,
    responses(
        (status = 200, description = "Appointment cancelled", body = Success<MessageBody>),
        (status = 400, description = "Appointment was already completed"),
        (status = 404, description = "Appointment not found")
    ),
    params(("atoken" = String, Header, description = "Admin session token"))
)]
pub async fn admin_cancel_appointment_handler(
    State(state): State<Arc<AppState>>,
    Body(req): Body<AppointmentIdRequest>,
) -> HandlerResult<Json<Success<MessageBody>>> {
    state.booking.cancel_as_admin(req.appointment_id).await?;
    Ok(message("Appointment Cancelled"))
}

/// GET /api/admin/dashboard
#[utoipa::path(
    get,
    path = "/api/admin/dashboard",
    responses(
        (
            status = 200,
            description = "Clinic totals and recent bookings",
            body = Success<AdminDashboardResponse>
        )
    ),
    params(("atoken" = String, Header, description = "Admin session token"))
)]
pub async fn admin_dashboard_handler(
    State(state): State<Arc<AppState>>,
) -> HandlerResult<Json<Success<AdminDashboardResponse>>> {
    let dashboard = state.booking.admin_dashboard().await?;
    Ok(ok(AdminDashboardResponse {
        dash_data: dashboard.into(),
    }))
}

/// POST /api/admin/add-patient - Register a walk-in patient and queue them
#[utoipa::path(
    post,
    path = "/api/admin/add-patient",
    request_body = AddPatientRequest,
    responses(
        (status = 200, description = "Walk-in patient queued", body = Success<AppointmentResponse>),
        (status = 400, description = "Missing or invalid details"),
        (status = 409, description = "Queue full or doctor unavailable")
    ),
    params(("atoken" = String, Header, description = "Admin session token"))
)]
pub async fn add_patient_handler(
    State(state): State<Arc<AppState>>,
    Body(req): Body<AddPatientRequest>,
) -> HandlerResult<Json<Success<AppointmentResponse>>> {
    let name = req.name.trim();
    let phone = req.phone.trim();
    if name.is_empty() || phone.is_empty() {
        return Err(HttpError::bad_request("Missing Details"));
    }
    if !state.validators.is_phone(phone) {
        return Err(HttpError::bad_request("Phone number must have 10 digits"));
    }
    let email = req
        .email
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty());
    if let Some(email) = email.as_deref() {
        if !state.validators.is_email(email) {
            return Err(HttpError::bad_request("Please enter a valid email"));
        }
    }

    let appointment = state
        .booking
        .book_walk_in(WalkInRequest {
            name: name.to_string(),
            phone: phone.to_string(),
            email,
            gender: req.gender.filter(|g| !g.trim().is_empty()),
            doctor_id: req.doc_id,
            slot_date: req.slot_date,
            slot_time: req.slot_time,
            description: req.description.trim().to_string(),
            paid: req.payment,
        })
        .await?;

    Ok(ok(AppointmentResponse {
        message: "Patient Added".to_string(),
        appointment: appointment.into(),
    }))
}
