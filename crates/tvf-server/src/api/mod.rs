//! HTTP API
//!
//! REST surface over [`FleetService`], used by the admin dashboard and by
//! terminals posting heartbeats. Bodies are JSON with camelCase fields;
//! every error response carries an [`ErrorBody`](tvf_core::api::ErrorBody).

mod error;
mod handlers;

pub use error::ApiError;

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;

use crate::fleet::FleetService;

/// Build the API router
pub fn router(fleet: Arc<FleetService>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/terminals",
            get(handlers::list_terminals).post(handlers::register_terminal),
        )
        .route("/api/terminals/stats", get(handlers::stats))
        .route("/api/terminals/inactive", get(handlers::list_inactive))
        .route("/api/terminals/heartbeat", post(handlers::heartbeat))
        .route(
            "/api/terminals/:id",
            get(handlers::get_terminal)
                .put(handlers::update_terminal)
                .delete(handlers::delete_terminal),
        )
        .route(
            "/api/terminals/:id/location",
            put(handlers::assign_location).delete(handlers::clear_location),
        )
        .route("/api/terminals/:id/active", put(handlers::set_active))
        .route("/api/terminals/:id/connectivity", post(handlers::test_connectivity))
        .route("/api/terminals/:id/services", post(handlers::test_services))
        .route("/api/terminals/:id/reboot", post(handlers::reboot))
        .with_state(fleet)
}
