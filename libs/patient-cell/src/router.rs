use std::sync::Arc;
use axum::{middleware, routing::get, Router};
use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;
use crate::services::PatientRepository;

pub fn create_patient_router(config: Arc<AppConfig>, repository: Arc<dyn PatientRepository>) -> Router {
    let state = PatientState { config: config.clone(), repository };

    Router::new()
        .route("/{id}", get(get_patient).put(update_patient))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(state)
}
