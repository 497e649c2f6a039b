// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use patient_cell::PatientError;
use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::{require_role, CLINICAL_ROLES, FRONT_DESK_ROLES};

use crate::models::{
    AppointmentError, BookAppointmentRequest, CompleteAppointmentRequest,
    StatusTransitionRequest, UpdateCompletedAppointmentRequest,
};
use crate::services::{
    AppointmentBookingService, CompletionService, CorrectionService, StatusTransitionService,
};
use crate::store::ClinicStore;

#[derive(Clone)]
pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn ClinicStore>,
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound
            | AppointmentError::PatientNotFound
            | AppointmentError::PrescriptionNotFound
            | AppointmentError::BillNotFound => AppError::NotFound(err.to_string()),
            AppointmentError::AlreadyCompleted
            | AppointmentError::NotCompleted(_)
            | AppointmentError::InvalidStatusTransition { .. }
            | AppointmentError::SlotTaken => AppError::Conflict(err.to_string()),
            AppointmentError::Conflict(msg) => AppError::Conflict(msg),
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::Billing(e) => AppError::ValidationError(e.to_string()),
            AppointmentError::Patient(PatientError::NotFound) => {
                AppError::NotFound("Patient not found".to_string())
            }
            AppointmentError::Patient(PatientError::ValidationError(msg)) => {
                AppError::ValidationError(msg)
            }
            AppointmentError::Patient(PatientError::DatabaseError(msg))
            | AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

pub fn parse_appointment_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw)
        .map_err(|_| AppError::ValidationError(format!("Invalid appointment id: {}", raw)))
}

// ==============================================================================
// BOOKING
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    // Patients may book for themselves; staff may book for anyone.
    if user.id != request.patient_id.to_string() {
        require_role(&user, FRONT_DESK_ROLES)?;
    }

    let service = AppointmentBookingService::new(state.store.clone());
    let appointment = service.book_appointment(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "appointment": appointment
        })),
    ))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let appointment_id = parse_appointment_id(&appointment_id)?;

    let service = AppointmentBookingService::new(state.store.clone());
    let appointment = service.get_appointment(appointment_id).await?;

    if user.id != appointment.patient_id.to_string() {
        require_role(&user, FRONT_DESK_ROLES)?;
    }

    Ok(Json(json!(appointment)))
}

// ==============================================================================
// COMPLETION AND CORRECTION
// ==============================================================================

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
    Json(request): Json<CompleteAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment_id = parse_appointment_id(&appointment_id)?;
    require_role(&user, CLINICAL_ROLES)?;

    let service = CompletionService::new(state.store.clone());
    let outcome = service
        .complete_appointment(appointment_id, request, Some(user.id.clone()))
        .await?;

    let mut body = json!({
        "success": true,
        "appointment": outcome.appointment,
        "prescription": outcome.prescription,
        "bill": outcome.bill,
    });
    if let Some(reminder) = outcome.reminder {
        body["reminder"] = json!(reminder);
    }
    if let Some(commission) = outcome.referral_commission {
        body["referral_commission"] = json!(commission);
    }

    Ok(Json(body))
}

#[axum::debug_handler]
pub async fn update_completed_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
    Json(request): Json<UpdateCompletedAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment_id = parse_appointment_id(&appointment_id)?;
    require_role(&user, CLINICAL_ROLES)?;

    let service = CorrectionService::new(state.store.clone());
    let outcome = service
        .update_completed_appointment(appointment_id, request, Some(user.id.clone()))
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": outcome.appointment,
        "prescription": outcome.prescription,
        "bill": outcome.bill,
        "reminder": outcome.reminder,
    })))
}

#[axum::debug_handler]
pub async fn transition_status(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
    Json(request): Json<StatusTransitionRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment_id = parse_appointment_id(&appointment_id)?;
    require_role(&user, CLINICAL_ROLES)?;

    let service = StatusTransitionService::new(state.store.clone());
    let appointment = service
        .transition_status(appointment_id, request.status, request.reason, Some(user.id.clone()))
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}
