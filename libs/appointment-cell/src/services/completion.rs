// libs/appointment-cell/src/services/completion.rs
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use billing_cell::services::{BillCalculator, BillContext, BillNumberGenerator};

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, CompleteAppointmentRequest,
    CompletionOutcome, Prescription, Reminder, ReminderRequest, ReminderType,
};
use crate::store::{ClinicStore, CompletionCommit};

const MAX_BILL_NUMBER_ATTEMPTS: usize = 5;

/// Builds the reminder for a visit: an explicit request wins, otherwise a
/// follow-up date on the prescription schedules one.
pub fn follow_up_reminder(
    appointment: &Appointment,
    prescription: Option<&Prescription>,
    requested: Option<&ReminderRequest>,
    now: DateTime<Utc>,
) -> Option<Reminder> {
    if let Some(request) = requested {
        let reminder_type = request.reminder_type.unwrap_or(ReminderType::Custom);
        let message = request
            .message
            .clone()
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| default_message(prescription));
        return Some(Reminder::for_appointment(
            appointment,
            reminder_type,
            request.reminder_date,
            message,
            now,
        ));
    }

    let prescription = prescription?;
    let date = prescription.scheduled_follow_up()?;
    Some(Reminder::for_appointment(
        appointment,
        ReminderType::FollowUp,
        date,
        default_message(Some(prescription)),
        now,
    ))
}

fn default_message(prescription: Option<&Prescription>) -> String {
    match prescription.map(|p| p.diagnosis.trim()).filter(|d| !d.is_empty()) {
        Some(diagnosis) => format!("Follow-up visit for {}", diagnosis),
        None => "Follow-up visit".to_string(),
    }
}

pub struct CompletionService {
    store: Arc<dyn ClinicStore>,
    bill_numbers: BillNumberGenerator,
}

impl CompletionService {
    pub fn new(store: Arc<dyn ClinicStore>) -> Self {
        Self {
            store,
            bill_numbers: BillNumberGenerator::new(),
        }
    }

    /// Records the outcome of a booked visit: prescription, bill, wallet
    /// deduction, referral commission and reminder land together or not at all.
    pub async fn complete_appointment(
        &self,
        appointment_id: Uuid,
        request: CompleteAppointmentRequest,
        completed_by: Option<String>,
    ) -> Result<CompletionOutcome, AppointmentError> {
        info!("Completing appointment {}", appointment_id);

        request.bill.validate()?;
        if let Some(update) = &request.patient_update {
            update.validate()?;
        }

        let appointment = self
            .store
            .find_appointment(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)?;

        match appointment.status {
            AppointmentStatus::Booked => {}
            AppointmentStatus::Completed => return Err(AppointmentError::AlreadyCompleted),
            AppointmentStatus::Cancelled => {
                return Err(AppointmentError::Conflict(
                    "Cancelled appointments cannot be completed".to_string(),
                ))
            }
        }

        let mut patient = self
            .store
            .find_patient(appointment.patient_id)
            .await?
            .ok_or(AppointmentError::PatientNotFound)?;

        let now = Utc::now();
        if let Some(update) = &request.patient_update {
            patient.apply_update(update, now);
        }

        let plan = patient.plan;
        let visit_charge = plan.effective_visit_charge(request.bill.fees.consultation_fee);
        let wallet = plan.wallet_terms(visit_charge);
        if visit_charge != request.bill.fees.consultation_fee {
            debug!("Plan visit charge {:.2} replaces consultation fee {:.2}",
                   visit_charge, request.bill.fees.consultation_fee);
        }
        if plan.is_wallet() && !plan.can_cover(visit_charge) {
            warn!("Wallet balance {:.2} of patient {} does not cover visit charge {:.2}",
                  plan.wallet_amount, patient.id, visit_charge);
        }

        let bill_number = self.issue_bill_number(now.date_naive()).await?;

        let prescription = Prescription::from_input(&appointment, &request.prescription, now);
        let bill = BillCalculator::build_bill(
            BillContext {
                appointment_id: appointment.id,
                patient_id: appointment.patient_id,
                doctor_id: appointment.doctor_id,
                branch_id: appointment.branch_id,
                bill_number,
                issued_at: now,
            },
            &request.bill,
            visit_charge,
            wallet.as_ref(),
        );
        let reminder = follow_up_reminder(
            &appointment,
            Some(&prescription),
            request.reminder.as_ref(),
            now,
        );

        let mut completed = appointment.clone();
        completed.mark_completed(prescription.id, bill.id, bill.total_amount, completed_by, now);

        let commit = CompletionCommit {
            appointment: completed,
            prescription,
            bill,
            payment: request.bill.payment_request(),
            patient_update: request.patient_update,
            wallet_charge: plan.is_wallet().then_some(visit_charge),
            referral_doctor_id: appointment.referred_by,
            reminder,
        };

        let outcome = self.store.commit_completion(commit).await?;

        info!("Appointment {} completed with bill {} totalling {:.2}",
              appointment_id, outcome.bill.bill_number, outcome.bill.total_amount);
        Ok(outcome)
    }

    async fn issue_bill_number(&self, date: NaiveDate) -> Result<String, AppointmentError> {
        for attempt in 1..=MAX_BILL_NUMBER_ATTEMPTS {
            let candidate = self.bill_numbers.generate(date);
            if !self.store.bill_number_exists(&candidate).await? {
                return Ok(candidate);
            }
            debug!("Bill number {} taken (attempt {})", candidate, attempt);
        }

        Err(AppointmentError::Conflict(format!(
            "Could not allocate a unique bill number after {} attempts",
            MAX_BILL_NUMBER_ATTEMPTS
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookAppointmentRequest, PrescriptionInput, ReminderStatus};

    fn appointment() -> Appointment {
        Appointment::new(
            &BookAppointmentRequest {
                patient_id: Uuid::new_v4(),
                doctor_id: Uuid::new_v4(),
                branch_id: Uuid::new_v4(),
                date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
                time_slot: "09:00".to_string(),
                referred_by: None,
                notes: None,
            },
            Utc::now(),
        )
    }

    fn prescription(appointment: &Appointment, follow_up: Option<NaiveDate>) -> Prescription {
        let input = PrescriptionInput {
            diagnosis: "Tinnitus".to_string(),
            follow_up_required: follow_up.is_some(),
            follow_up_date: follow_up,
            ..Default::default()
        };
        Prescription::from_input(appointment, &input, Utc::now())
    }

    #[test]
    fn test_no_reminder_without_request_or_follow_up() {
        let appointment = appointment();
        let prescription = prescription(&appointment, None);
        assert!(follow_up_reminder(&appointment, Some(&prescription), None, Utc::now()).is_none());
    }

    #[test]
    fn test_follow_up_date_schedules_reminder() {
        let appointment = appointment();
        let date = NaiveDate::from_ymd_opt(2024, 6, 20).unwrap();
        let prescription = prescription(&appointment, Some(date));

        let reminder = follow_up_reminder(&appointment, Some(&prescription), None, Utc::now()).unwrap();
        assert_eq!(reminder.reminder_type, ReminderType::FollowUp);
        assert_eq!(reminder.reminder_date, date);
        assert_eq!(reminder.status, ReminderStatus::Pending);
        assert_eq!(reminder.message, "Follow-up visit for Tinnitus");
        assert_eq!(reminder.patient_id, appointment.patient_id);
    }

    #[test]
    fn test_explicit_request_wins() {
        let appointment = appointment();
        let prescription = prescription(&appointment, NaiveDate::from_ymd_opt(2024, 6, 20));
        let request = ReminderRequest {
            reminder_date: NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            message: Some("Collect hearing aid".to_string()),
            reminder_type: None,
        };

        let reminder =
            follow_up_reminder(&appointment, Some(&prescription), Some(&request), Utc::now()).unwrap();
        assert_eq!(reminder.reminder_type, ReminderType::Custom);
        assert_eq!(reminder.reminder_date, request.reminder_date);
        assert_eq!(reminder.message, "Collect hearing aid");
    }
}
