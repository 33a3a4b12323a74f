pub mod admin;
pub mod articles;
pub mod auth;
pub mod doctor;
pub mod middleware;
pub mod response;
pub mod rest;
pub mod routes;
pub mod state;
pub mod user;
pub mod validation;

// Re-export the router builder so the binary and the integration tests
// assemble the exact same application.
pub use routes::build_router;
