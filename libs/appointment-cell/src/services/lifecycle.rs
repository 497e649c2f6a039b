// libs/appointment-cell/src/services/lifecycle.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{Appointment, AppointmentError, AppointmentStatus, StatusChange};
use crate::store::{ClinicStore, StatusCommit};

#[derive(Debug, Default, Clone, Copy)]
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate a manual status change. Completion has its own workflow and
    /// is never reachable from here.
    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if !self.get_valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidStatusTransition {
                from: current_status,
                to: new_status,
            });
        }

        Ok(())
    }

    /// All statuses reachable by a manual transition.
    pub fn get_valid_transitions(&self, current_status: AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Booked => vec![AppointmentStatus::Cancelled],
            AppointmentStatus::Completed => vec![
                AppointmentStatus::Booked,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::Cancelled => vec![AppointmentStatus::Booked],
        }
    }
}

/// Audited status changes outside of completion.
pub struct StatusTransitionService {
    store: Arc<dyn ClinicStore>,
    lifecycle: AppointmentLifecycleService,
}

impl StatusTransitionService {
    pub fn new(store: Arc<dyn ClinicStore>) -> Self {
        Self {
            store,
            lifecycle: AppointmentLifecycleService::new(),
        }
    }

    pub async fn transition_status(
        &self,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
        reason: Option<String>,
        changed_by: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self
            .store
            .find_appointment(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)?;

        self.lifecycle.validate_status_transition(appointment.status, new_status)?;

        let commit = StatusCommit {
            appointment_id,
            change: StatusChange {
                from: appointment.status,
                to: new_status,
                reason,
                changed_by,
                at: Utc::now(),
            },
        };

        let updated = self.store.commit_status_change(commit).await?;
        info!("Appointment {} transitioned {} -> {}", appointment_id, appointment.status, updated.status);
        Ok(updated)
    }
}
