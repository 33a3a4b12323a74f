//! Shared fixtures for the integration tests: a fixed clock, a config that
//! needs no environment, and a server bound to an ephemeral port.

#![allow(dead_code)]

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use clinic_api::adapters::MemoryDb;
use clinic_api::config::Config;
use clinic_api::web::{build_router, state::AppState, validation::Validators};
use clinic_core::ports::{Clock, DatabaseService};
use clinic_core::{BookingService, ClinicPolicy};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

pub const ADMIN_EMAIL: &str = "admin@clinic.test";
pub const ADMIN_PASSWORD: &str = "admin-secret";

pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

/// Monday 2 June 2025, 09:00 clinic time.
pub fn monday_morning() -> NaiveDateTime {
    date(2025, 6, 2).and_time(time(9, 0))
}

pub fn test_config(policy: ClinicPolicy) -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        database_url: None,
        log_level: tracing::Level::INFO,
        admin_email: ADMIN_EMAIL.to_string(),
        admin_password: ADMIN_PASSWORD.to_string(),
        session_ttl: chrono::Duration::days(30),
        session_sweep_interval: Duration::from_secs(600),
        cors_origins: vec!["http://localhost:5173".to_string()],
        clinic_offset: FixedOffset::east_opt(330 * 60).unwrap(),
        policy,
    }
}

pub fn booking_service(
    db: Arc<dyn DatabaseService>,
    now: NaiveDateTime,
    policy: ClinicPolicy,
) -> BookingService {
    BookingService::new(db, Arc::new(FixedClock(now)), policy)
}

/// A running server plus a client pointed at it.
pub struct TestApp {
    pub base: String,
    pub client: reqwest::Client,
    pub db: Arc<dyn DatabaseService>,
}

impl TestApp {
    pub async fn spawn(now: NaiveDateTime, policy: ClinicPolicy) -> Self {
        let db: Arc<dyn DatabaseService> = Arc::new(MemoryDb::new());
        let config = Arc::new(test_config(policy));
        let state = Arc::new(AppState::new(
            db.clone(),
            Arc::new(FixedClock(now)),
            config,
            Validators::new().unwrap(),
        ));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, build_router(state)).await.unwrap();
        });

        Self {
            base: format!("http://{}", addr),
            client: reqwest::Client::new(),
            db,
        }
    }

    /// POSTs `body` to `path` with an optional `(header, token)` pair.
    pub async fn post(&self, path: &str, auth: Option<(&str, &str)>, body: Value) -> (u16, Value) {
        let mut request = self.client.post(format!("{}{}", self.base, path)).json(&body);
        if let Some((header, token)) = auth {
            request = request.header(header, token);
        }
        let response = request.send().await.unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    pub async fn get(&self, path: &str, auth: Option<(&str, &str)>) -> (u16, Value) {
        let mut request = self.client.get(format!("{}{}", self.base, path));
        if let Some((header, token)) = auth {
            request = request.header(header, token);
        }
        let response = request.send().await.unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    pub async fn admin_token(&self) -> String {
        let (status, body) = self
            .post(
                "/api/admin/login",
                None,
                json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }),
            )
            .await;
        assert_eq!(status, 200, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    /// Adds a doctor through the admin API and returns its id.
    pub async fn add_doctor(&self, atoken: &str, email: &str, fees: i32) -> String {
        let (status, body) = self
            .post(
                "/api/admin/add-doctor",
                Some(("atoken", atoken)),
                json!({
                    "name": "Dr. Asha Rao",
                    "email": email,
                    "password": "doctor-pass",
                    "image": "https://img.example.org/asha.png",
                    "speciality": "General physician",
                    "degree": "MBBS",
                    "experience": "4 Years",
                    "about": "Primary care.",
                    "fees": fees,
                    "address": { "line1": "12 Lake Road", "line2": "Pune" }
                }),
            )
            .await;
        assert_eq!(status, 200, "{body}");
        body["doctor"]["id"].as_str().unwrap().to_string()
    }

    /// Registers a patient and returns their session token.
    pub async fn register(&self, email: &str) -> String {
        let (status, body) = self
            .post(
                "/api/user/register",
                None,
                json!({ "name": "Meera", "email": email, "password": "patient-pass" }),
            )
            .await;
        assert_eq!(status, 200, "{body}");
        body["token"].as_str().unwrap().to_string()
    }
}
