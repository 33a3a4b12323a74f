//! services/api/src/web/routes.rs
//!
//! Assembles the full application router: route groups per role, their auth
//! layers, CORS, and the Swagger UI.

use crate::web::{
    admin, articles, auth, doctor,
    middleware::{require_admin, require_doctor, require_patient},
    response::not_found,
    rest::ApiDoc,
    state::AppState,
    user,
};
use axum::{
    extract::DefaultBodyLimit,
    http::{header::CONTENT_TYPE, HeaderName, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

const BODY_LIMIT_BYTES: usize = 1024 * 1024;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            CONTENT_TYPE,
            HeaderName::from_static(auth::PATIENT_TOKEN_HEADER),
            HeaderName::from_static(auth::DOCTOR_TOKEN_HEADER),
            HeaderName::from_static(auth::ADMIN_TOKEN_HEADER),
        ])
}

/// Builds the router for the whole service around the shared state.
pub fn build_router(state: Arc<AppState>) -> Router {
    // Patient routes
    let user_public = Router::new()
        .route("/register", post(auth::register_handler))
        .route("/login", post(auth::user_login_handler))
        .route("/logout", post(auth::logout_handler));
    let user_protected = Router::new()
        .route("/get-profile", get(user::get_profile_handler))
        .route("/update-profile", post(user::update_profile_handler))
        .route("/book-appointment", post(user::book_appointment_handler))
        .route("/appointments", get(user::list_appointments_handler))
        .route("/cancel-appointment", post(user::cancel_appointment_handler))
        .route(
            "/reschedule-appointment",
            post(user::reschedule_appointment_handler),
        )
        .route("/get-available-slots", post(user::available_slots_handler))
        .route("/get-queue-slots", post(user::queue_slots_handler))
        .route("/get-queue-position", post(user::queue_position_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_patient,
        ));

    // Doctor routes
    let doctor_public = Router::new()
        .route("/list", get(doctor::list_doctors_handler))
        .route("/login", post(auth::doctor_login_handler));
    let doctor_protected = Router::new()
        .route("/appointments", get(doctor::doctor_appointments_handler))
        .route(
            "/complete-appointment",
            post(doctor::complete_appointment_handler),
        )
        .route(
            "/cancel-appointment",
            post(doctor::doctor_cancel_appointment_handler),
        )
        .route("/dashboard", get(doctor::doctor_dashboard_handler))
        .route("/profile", get(doctor::doctor_profile_handler))
        .route("/update-profile", post(doctor::update_doctor_profile_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_doctor,
        ));

    // Admin routes
    let admin_public = Router::new().route("/login", post(auth::admin_login_handler));
    let admin_protected = Router::new()
        .route("/add-doctor", post(admin::add_doctor_handler))
        .route("/all-doctors", post(admin::all_doctors_handler))
        .route("/change-availability", post(admin::change_availability_handler))
        .route("/appointments", get(admin::all_appointments_handler))
        .route(
            "/cancel-appointment",
            post(admin::admin_cancel_appointment_handler),
        )
        .route("/dashboard", get(admin::admin_dashboard_handler))
        .route("/add-patient", post(admin::add_patient_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_admin,
        ));

    // Article routes
    let articles_public = Router::new().route("/", get(articles::list_articles_handler));
    let articles_protected = Router::new()
        .route("/add-article", post(articles::add_article_handler))
        .route("/set-approval", post(articles::set_approval_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_admin,
        ));

    let api_router = Router::new()
        .route("/", get(|| async { "API working" }))
        .nest("/api/user", user_public.merge(user_protected))
        .nest("/api/doctor", doctor_public.merge(doctor_protected))
        .nest("/api/admin", admin_public.merge(admin_protected))
        .nest("/api/articles", articles_public.merge(articles_protected))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state);

    // Merge the API router with the Swagger UI router for a complete application.
    Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .fallback(not_found)
}
