// libs/appointment-cell/src/services/correction.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{
    AppointmentError, AppointmentStatus, CorrectionOutcome, Prescription, StatusChange,
    UpdateCompletedAppointmentRequest,
};
use crate::services::completion::follow_up_reminder;
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::store::{ClinicStore, CorrectionCommit};

/// Edits to the records of an already completed visit.
pub struct CorrectionService {
    store: Arc<dyn ClinicStore>,
    lifecycle: AppointmentLifecycleService,
}

impl CorrectionService {
    pub fn new(store: Arc<dyn ClinicStore>) -> Self {
        Self {
            store,
            lifecycle: AppointmentLifecycleService::new(),
        }
    }

    /// Overwrites the present prescription and bill fields and re-derives the
    /// bill. A requested status change is validated up front, recorded as an
    /// audit entry, and committed together with the corrected records.
    pub async fn update_completed_appointment(
        &self,
        appointment_id: Uuid,
        request: UpdateCompletedAppointmentRequest,
        changed_by: Option<String>,
    ) -> Result<CorrectionOutcome, AppointmentError> {
        info!("Correcting completed appointment {}", appointment_id);

        if let Some(update) = &request.bill {
            update.validate()?;
        }

        let appointment = self
            .store
            .find_appointment(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)?;

        if appointment.status != AppointmentStatus::Completed {
            return Err(AppointmentError::NotCompleted(appointment.status));
        }

        let now = Utc::now();

        // Staying completed is not a transition.
        let status_change = match request.status {
            Some(status) if status != appointment.status => {
                self.lifecycle.validate_status_transition(appointment.status, status)?;
                Some(StatusChange {
                    from: appointment.status,
                    to: status,
                    reason: request.status_reason.clone(),
                    changed_by,
                    at: now,
                })
            }
            _ => None,
        };

        let prescription = match &request.prescription {
            Some(update) => {
                let mut prescription = self.load_prescription(appointment.prescription_id).await?;
                prescription.apply_update(update, now);
                Some(prescription)
            }
            None => None,
        };

        let bill = match &request.bill {
            Some(update) => {
                let bill_id = appointment.bill_id.ok_or(AppointmentError::BillNotFound)?;
                let mut bill = self
                    .store
                    .find_bill(bill_id)
                    .await?
                    .ok_or(AppointmentError::BillNotFound)?;
                bill.apply_update(update, now);
                debug!("Bill {} recalculated: total {:.2}, remaining {:.2}, status {}",
                       bill.bill_number, bill.total_amount, bill.remaining_amount, bill.payment_status);
                Some(bill)
            }
            None => None,
        };

        let reminder = match &request.reminder {
            Some(requested) => {
                // Only needed for the default message.
                let current = match &prescription {
                    Some(p) => Some(p.clone()),
                    None => match appointment.prescription_id {
                        Some(id) => self.store.find_prescription(id).await?,
                        None => None,
                    },
                };
                follow_up_reminder(&appointment, current.as_ref(), Some(requested), now)
            }
            None => None,
        };

        let outcome = self
            .store
            .commit_correction(CorrectionCommit {
                appointment_id,
                prescription,
                bill,
                reminder,
                status_change,
            })
            .await?;

        info!("Completed appointment {} corrected, now {}", appointment_id, outcome.appointment.status);
        Ok(outcome)
    }

    async fn load_prescription(
        &self,
        prescription_id: Option<Uuid>,
    ) -> Result<Prescription, AppointmentError> {
        let id = prescription_id.ok_or(AppointmentError::PrescriptionNotFound)?;
        self.store
            .find_prescription(id)
            .await?
            .ok_or(AppointmentError::PrescriptionNotFound)
    }
}
