//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use crate::web::validation::Validators;
use clinic_core::ports::{Clock, DatabaseService};
use clinic_core::BookingService;
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub booking: BookingService,
    pub validators: Arc<Validators>,
}

impl AppState {
    /// Wires the booking service to the given store and clock.
    pub fn new(
        db: Arc<dyn DatabaseService>,
        clock: Arc<dyn Clock>,
        config: Arc<Config>,
        validators: Validators,
    ) -> Self {
        let booking = BookingService::new(db.clone(), clock, config.policy.clone());
        Self {
            db,
            config,
            booking,
            validators: Arc::new(validators),
        }
    }
}
