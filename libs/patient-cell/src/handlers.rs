use std::sync::Arc;
use axum::{
    extract::{Path, State, Extension},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::{require_role, FRONT_DESK_ROLES};

use crate::models::{PatientError, UpdatePatientRequest};
use crate::services::{PatientRepository, PatientService};

#[derive(Clone)]
pub struct PatientState {
    pub config: Arc<AppConfig>,
    pub repository: Arc<dyn PatientRepository>,
}

impl From<PatientError> for AppError {
    fn from(err: PatientError) -> Self {
        match err {
            PatientError::NotFound => AppError::NotFound("Patient not found".to_string()),
            PatientError::ValidationError(msg) => AppError::ValidationError(msg),
            PatientError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

pub fn parse_patient_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw)
        .map_err(|_| AppError::ValidationError(format!("Invalid patient id: {}", raw)))
}

#[axum::debug_handler]
pub async fn get_patient(
    State(state): State<PatientState>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let patient_id = parse_patient_id(&patient_id)?;

    // Patients may read their own record; staff may read any.
    if user.id != patient_id.to_string() {
        require_role(&user, FRONT_DESK_ROLES)?;
    }

    let service = PatientService::new(state.repository.clone());
    let patient = service.get_patient(patient_id).await?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn update_patient(
    State(state): State<PatientState>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<String>,
    Json(request): Json<UpdatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    let patient_id = parse_patient_id(&patient_id)?;
    require_role(&user, FRONT_DESK_ROLES)?;

    let service = PatientService::new(state.repository.clone());
    let patient = service.update_patient(patient_id, request).await?;

    Ok(Json(json!({
        "success": true,
        "patient": patient
    })))
}
