// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, AppointmentState};
use crate::store::ClinicStore;

pub fn appointment_routes(config: Arc<AppConfig>, store: Arc<dyn ClinicStore>) -> Router {
    let state = AppointmentState { config: config.clone(), store };

    // All appointment operations require authentication
    Router::new()
        .route("/", post(handlers::book_appointment))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route(
            "/{appointment_id}/complete",
            post(handlers::complete_appointment).put(handlers::update_completed_appointment),
        )
        .route("/{appointment_id}/status", post(handlers::transition_status))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(state)
}
