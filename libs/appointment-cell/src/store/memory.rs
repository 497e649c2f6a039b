use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use billing_cell::{Bill, PaymentStatus};
use doctor_cell::ReferralDoctor;
use patient_cell::{Patient, PatientRepository, UpdatePatientRequest};
use shared_database::StoreError;

use crate::models::{
    Appointment, AppointmentStatus, CompletionOutcome, CorrectionOutcome, Prescription, Reminder,
    StatusChange,
};
use crate::store::{ClinicStore, CompletionCommit, CorrectionCommit, StatusCommit};

#[derive(Default)]
struct Collections {
    appointments: HashMap<Uuid, Appointment>,
    patients: HashMap<Uuid, Patient>,
    prescriptions: HashMap<Uuid, Prescription>,
    bills: HashMap<Uuid, Bill>,
    referral_doctors: HashMap<Uuid, ReferralDoctor>,
    reminders: Vec<Reminder>,
}

impl Collections {
    fn slot_holder(&self, appointment: &Appointment) -> Option<&Appointment> {
        self.appointments.values().find(|existing| {
            existing.id != appointment.id && existing.occupies_slot() && existing.same_slot(appointment)
        })
    }

    fn active_bill_for(&self, appointment_id: Uuid) -> Option<&Bill> {
        self.bills.values().find(|bill| {
            bill.appointment_id == appointment_id && bill.payment_status != PaymentStatus::Cancelled
        })
    }

    fn check_status_change(&self, appointment: &Appointment, change: &StatusChange) -> Result<(), StoreError> {
        expect_status(appointment, change.from)?;

        if change.reopens() {
            if let Some(holder) = self.slot_holder(appointment) {
                return Err(StoreError::Conflict(format!(
                    "Slot {} {} already held by appointment {}",
                    appointment.date, appointment.time_slot, holder.id
                )));
            }
        }
        Ok(())
    }

    /// Only call after `check_status_change` passed.
    fn apply_status_change(&mut self, appointment: &mut Appointment, change: StatusChange) {
        let at = change.at;
        if change.cancels_bill() || change.reopens() {
            if let Some(bill) = appointment.bill_id.and_then(|id| self.bills.get_mut(&id)) {
                bill.cancel(at);
            }
        }
        if change.reopens() {
            appointment.prescription_id = None;
            appointment.bill_id = None;
            appointment.charges = None;
        }

        appointment.record_transition(change.to, change.reason, change.changed_by, at);
        self.appointments.insert(appointment.id, appointment.clone());
    }
}

/// Process-local store. Every write takes the single write lock for the whole
/// check-and-write, which makes each commit atomic.
#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<Collections>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_patient(&self, patient: Patient) {
        let mut data = self.data.write().await;
        data.patients.insert(patient.id, patient);
    }

    pub async fn insert_referral_doctor(&self, doctor: ReferralDoctor) {
        let mut data = self.data.write().await;
        data.referral_doctors.insert(doctor.id, doctor);
    }

    pub async fn referral_doctor(&self, doctor_id: Uuid) -> Option<ReferralDoctor> {
        self.data.read().await.referral_doctors.get(&doctor_id).cloned()
    }

    pub async fn reminders_for(&self, appointment_id: Uuid) -> Vec<Reminder> {
        self.data
            .read()
            .await
            .reminders
            .iter()
            .filter(|reminder| reminder.appointment_id == appointment_id)
            .cloned()
            .collect()
    }

    pub async fn bills_for(&self, appointment_id: Uuid) -> Vec<Bill> {
        self.data
            .read()
            .await
            .bills
            .values()
            .filter(|bill| bill.appointment_id == appointment_id)
            .cloned()
            .collect()
    }

    pub async fn prescriptions_for(&self, appointment_id: Uuid) -> Vec<Prescription> {
        self.data
            .read()
            .await
            .prescriptions
            .values()
            .filter(|prescription| prescription.appointment_id == appointment_id)
            .cloned()
            .collect()
    }
}

fn expect_status(
    appointment: &Appointment,
    expected: AppointmentStatus,
) -> Result<(), StoreError> {
    if appointment.status == expected {
        Ok(())
    } else {
        Err(StoreError::Conflict(format!(
            "Appointment {} is {}, expected {}",
            appointment.id, appointment.status, expected
        )))
    }
}

#[async_trait]
impl PatientRepository for MemoryStore {
    async fn find_patient(&self, patient_id: Uuid) -> Result<Option<Patient>, StoreError> {
        Ok(self.data.read().await.patients.get(&patient_id).cloned())
    }

    async fn update_patient(
        &self,
        patient_id: Uuid,
        update: &UpdatePatientRequest,
    ) -> Result<Patient, StoreError> {
        let mut data = self.data.write().await;
        let patient = data
            .patients
            .get_mut(&patient_id)
            .ok_or_else(|| StoreError::NotFound(format!("Patient {}", patient_id)))?;

        patient.apply_update(update, Utc::now());
        Ok(patient.clone())
    }
}

#[async_trait]
impl ClinicStore for MemoryStore {
    async fn find_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Ok(self.data.read().await.appointments.get(&appointment_id).cloned())
    }

    async fn insert_appointment(&self, appointment: &Appointment) -> Result<Appointment, StoreError> {
        let mut data = self.data.write().await;

        if let Some(holder) = data.slot_holder(appointment) {
            return Err(StoreError::Conflict(format!(
                "Slot {} {} already held by appointment {}",
                appointment.date, appointment.time_slot, holder.id
            )));
        }

        data.appointments.insert(appointment.id, appointment.clone());
        debug!("Stored appointment {}", appointment.id);
        Ok(appointment.clone())
    }

    async fn find_prescription(&self, prescription_id: Uuid) -> Result<Option<Prescription>, StoreError> {
        Ok(self.data.read().await.prescriptions.get(&prescription_id).cloned())
    }

    async fn find_bill(&self, bill_id: Uuid) -> Result<Option<Bill>, StoreError> {
        Ok(self.data.read().await.bills.get(&bill_id).cloned())
    }

    async fn bill_number_exists(&self, bill_number: &str) -> Result<bool, StoreError> {
        Ok(self
            .data
            .read()
            .await
            .bills
            .values()
            .any(|bill| bill.bill_number == bill_number))
    }

    async fn commit_completion(&self, commit: CompletionCommit) -> Result<CompletionOutcome, StoreError> {
        let CompletionCommit {
            appointment,
            prescription,
            mut bill,
            payment,
            patient_update,
            wallet_charge,
            referral_doctor_id,
            reminder,
        } = commit;
        let at = appointment.updated_at;

        let mut data = self.data.write().await;

        // Every check runs before the first mutation.
        let stored = data
            .appointments
            .get(&appointment.id)
            .ok_or_else(|| StoreError::NotFound(format!("Appointment {}", appointment.id)))?;
        expect_status(stored, AppointmentStatus::Booked)?;

        if stored.prescription_id.is_some() || data.prescriptions.contains_key(&prescription.id) {
            return Err(StoreError::Conflict(format!(
                "Prescription already exists for appointment {}",
                appointment.id
            )));
        }
        if data.active_bill_for(appointment.id).is_some() {
            return Err(StoreError::Conflict(format!(
                "Bill already exists for appointment {}",
                appointment.id
            )));
        }
        if data.bills.values().any(|existing| existing.bill_number == bill.bill_number) {
            return Err(StoreError::Conflict(format!(
                "Bill number {} already issued",
                bill.bill_number
            )));
        }

        let mut patient = data
            .patients
            .get(&appointment.patient_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Patient {}", appointment.patient_id)))?;

        if let Some(update) = &patient_update {
            patient.apply_update(update, at);
        }

        let wallet = wallet_charge.and_then(|charge| patient.plan.wallet_terms(charge));
        bill.settle_payment(&payment, wallet.as_ref());

        if let Some(charge) = wallet_charge {
            if patient.plan.deduct_visit(charge) {
                bill.wallet_deduction = charge;
                patient.updated_at = at;
            } else {
                warn!(
                    "Wallet balance {:.2} cannot cover visit charge {:.2} for patient {}, skipping deduction",
                    patient.plan.wallet_amount, charge, patient.id
                );
                bill.wallet_deduction = 0.0;
            }
        }

        let referral_commission = match referral_doctor_id {
            Some(doctor_id) => match data.referral_doctors.get_mut(&doctor_id) {
                Some(doctor) => Some(doctor.credit_commission(bill.total_amount, at)),
                None => {
                    warn!("Referral doctor {} not found, no commission credited", doctor_id);
                    None
                }
            },
            None => None,
        };

        data.patients.insert(patient.id, patient.clone());
        data.prescriptions.insert(prescription.id, prescription.clone());
        data.bills.insert(bill.id, bill.clone());
        data.appointments.insert(appointment.id, appointment.clone());
        if let Some(reminder) = &reminder {
            data.reminders.push(reminder.clone());
        }

        info!(
            "Committed completion of appointment {} with bill {}",
            appointment.id, bill.bill_number
        );

        Ok(CompletionOutcome {
            appointment,
            prescription,
            bill,
            patient,
            reminder,
            referral_commission,
        })
    }

    async fn commit_correction(&self, commit: CorrectionCommit) -> Result<CorrectionOutcome, StoreError> {
        let CorrectionCommit {
            appointment_id,
            prescription,
            bill,
            reminder,
            status_change,
        } = commit;
        let mut data = self.data.write().await;

        let mut appointment = data
            .appointments
            .get(&appointment_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Appointment {}", appointment_id)))?;
        expect_status(&appointment, AppointmentStatus::Completed)?;

        if let Some(prescription) = &prescription {
            if appointment.prescription_id != Some(prescription.id) {
                return Err(StoreError::Conflict(format!(
                    "Prescription {} does not belong to appointment {}",
                    prescription.id, appointment.id
                )));
            }
        }
        if let Some(bill) = &bill {
            if appointment.bill_id != Some(bill.id) {
                return Err(StoreError::Conflict(format!(
                    "Bill {} does not belong to appointment {}",
                    bill.id, appointment.id
                )));
            }
        }
        if let Some(change) = &status_change {
            data.check_status_change(&appointment, change)?;
        }

        if let Some(bill) = &bill {
            appointment.charges = Some(bill.total_amount);
            appointment.updated_at = bill.updated_at;
            data.bills.insert(bill.id, bill.clone());
        }
        if let Some(prescription) = &prescription {
            data.prescriptions.insert(prescription.id, prescription.clone());
        }
        if let Some(reminder) = &reminder {
            data.reminders.push(reminder.clone());
        }
        data.appointments.insert(appointment.id, appointment.clone());

        let bill_id = appointment.bill_id;
        let bill = match status_change {
            Some(change) => {
                data.apply_status_change(&mut appointment, change);
                info!("Appointment {} moved to {} during correction", appointment.id, appointment.status);
                // The status change may have cancelled the bill.
                bill_id.and_then(|id| data.bills.get(&id).cloned())
            }
            None => bill,
        };

        debug!("Committed correction of appointment {}", appointment.id);

        Ok(CorrectionOutcome {
            appointment,
            prescription,
            bill,
            reminder,
        })
    }

    async fn commit_status_change(&self, commit: StatusCommit) -> Result<Appointment, StoreError> {
        let mut data = self.data.write().await;

        let mut appointment = data
            .appointments
            .get(&commit.appointment_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Appointment {}", commit.appointment_id)))?;
        data.check_status_change(&appointment, &commit.change)?;
        data.apply_status_change(&mut appointment, commit.change);

        info!("Appointment {} moved to {}", appointment.id, appointment.status);
        Ok(appointment)
    }
}
