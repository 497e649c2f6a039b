// libs/appointment-cell/src/models.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use billing_cell::{Bill, BillInput, BillUpdate, BillingError};
use patient_cell::{Patient, PatientError, UpdatePatientRequest};

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub branch_id: Uuid,
    pub date: NaiveDate,
    pub time_slot: String,
    pub status: AppointmentStatus,
    pub prescription_id: Option<Uuid>,
    pub bill_id: Option<Uuid>,
    /// Snapshot of the bill total taken at completion.
    pub charges: Option<f64>,
    /// Referring doctor credited with commission on completion.
    pub referred_by: Option<Uuid>,
    pub notes: Option<String>,
    #[serde(default)]
    pub status_history: Vec<StatusChange>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn new(request: &BookAppointmentRequest, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id: request.patient_id,
            doctor_id: request.doctor_id,
            branch_id: request.branch_id,
            date: request.date,
            time_slot: request.time_slot.trim().to_string(),
            status: AppointmentStatus::Booked,
            prescription_id: None,
            bill_id: None,
            charges: None,
            referred_by: request.referred_by,
            notes: request.notes.clone(),
            status_history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Cancelled appointments release their slot.
    pub fn occupies_slot(&self) -> bool {
        self.status != AppointmentStatus::Cancelled
    }

    /// Same doctor, branch, date and time slot.
    pub fn same_slot(&self, other: &Appointment) -> bool {
        self.doctor_id == other.doctor_id
            && self.branch_id == other.branch_id
            && self.date == other.date
            && self.time_slot == other.time_slot
    }

    pub fn record_transition(
        &mut self,
        to: AppointmentStatus,
        reason: Option<String>,
        changed_by: Option<String>,
        at: DateTime<Utc>,
    ) {
        self.status_history.push(StatusChange {
            from: self.status,
            to,
            reason,
            changed_by,
            at,
        });
        self.status = to;
        self.updated_at = at;
    }

    pub fn mark_completed(
        &mut self,
        prescription_id: Uuid,
        bill_id: Uuid,
        charges: f64,
        completed_by: Option<String>,
        at: DateTime<Utc>,
    ) {
        self.prescription_id = Some(prescription_id);
        self.bill_id = Some(bill_id);
        self.charges = Some(charges);
        self.record_transition(AppointmentStatus::Completed, None, completed_by, at);
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Booked,
    Completed,
    Cancelled,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Booked => write!(f, "booked"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Audit entry for every status change of an appointment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusChange {
    pub from: AppointmentStatus,
    pub to: AppointmentStatus,
    pub reason: Option<String>,
    pub changed_by: Option<String>,
    pub at: DateTime<Utc>,
}

impl StatusChange {
    /// Cancelling a visit voids its bill.
    pub fn cancels_bill(&self) -> bool {
        self.to == AppointmentStatus::Cancelled
    }

    /// Returning to booked detaches any prescription and bill so the visit
    /// can be completed again, and puts the slot back under the uniqueness rule.
    pub fn reopens(&self) -> bool {
        self.to == AppointmentStatus::Booked
    }
}

// ==============================================================================
// PRESCRIPTION MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Medicine {
    #[serde(default)]
    pub name: String,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub duration: Option<String>,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prescription {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub diagnosis: String,
    pub symptoms: Vec<String>,
    pub medicines: Vec<Medicine>,
    pub treatment: String,
    pub notes: Option<String>,
    pub follow_up_required: bool,
    pub follow_up_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Prescription {
    pub fn from_input(appointment: &Appointment, input: &PrescriptionInput, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            appointment_id: appointment.id,
            patient_id: appointment.patient_id,
            doctor_id: appointment.doctor_id,
            diagnosis: input.diagnosis.clone(),
            symptoms: input.symptoms.clone(),
            medicines: input.medicines.clone(),
            treatment: input.treatment.clone(),
            notes: input.notes.clone(),
            follow_up_required: input.follow_up_required,
            follow_up_date: input.follow_up_date,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_update(&mut self, update: &PrescriptionUpdate, now: DateTime<Utc>) {
        if let Some(diagnosis) = &update.diagnosis {
            self.diagnosis = diagnosis.clone();
        }
        if let Some(symptoms) = &update.symptoms {
            self.symptoms = symptoms.clone();
        }
        if let Some(medicines) = &update.medicines {
            self.medicines = medicines.clone();
        }
        if let Some(treatment) = &update.treatment {
            self.treatment = treatment.clone();
        }
        if let Some(notes) = &update.notes {
            self.notes = Some(notes.clone());
        }
        if let Some(required) = update.follow_up_required {
            self.follow_up_required = required;
        }
        if let Some(date) = update.follow_up_date {
            self.follow_up_date = Some(date);
        }
        self.updated_at = now;
    }

    /// Date of the follow-up visit, when one was asked for.
    pub fn scheduled_follow_up(&self) -> Option<NaiveDate> {
        if self.follow_up_required {
            self.follow_up_date
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PrescriptionInput {
    #[serde(default)]
    pub diagnosis: String,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub medicines: Vec<Medicine>,
    #[serde(default)]
    pub treatment: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, alias = "followUpRequired")]
    pub follow_up_required: bool,
    #[serde(default, alias = "followUpDate")]
    pub follow_up_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PrescriptionUpdate {
    pub diagnosis: Option<String>,
    pub symptoms: Option<Vec<String>>,
    pub medicines: Option<Vec<Medicine>>,
    pub treatment: Option<String>,
    pub notes: Option<String>,
    #[serde(default, alias = "followUpRequired")]
    pub follow_up_required: Option<bool>,
    #[serde(default, alias = "followUpDate")]
    pub follow_up_date: Option<NaiveDate>,
}

// ==============================================================================
// REMINDER MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReminderType {
    FollowUp,
    Custom,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReminderStatus {
    Pending,
    Sent,
    Dismissed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reminder {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub appointment_id: Uuid,
    pub branch_id: Uuid,
    pub reminder_type: ReminderType,
    pub reminder_date: NaiveDate,
    pub message: String,
    pub status: ReminderStatus,
    pub created_at: DateTime<Utc>,
}

impl Reminder {
    pub fn for_appointment(
        appointment: &Appointment,
        reminder_type: ReminderType,
        reminder_date: NaiveDate,
        message: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id: appointment.patient_id,
            appointment_id: appointment.id,
            branch_id: appointment.branch_id,
            reminder_type,
            reminder_date,
            message,
            status: ReminderStatus::Pending,
            created_at: now,
        }
    }
}

/// Explicit reminder requested by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderRequest {
    #[serde(alias = "reminderDate", alias = "date")]
    pub reminder_date: NaiveDate,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, alias = "reminderType", alias = "type")]
    pub reminder_type: Option<ReminderType>,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub branch_id: Uuid,
    pub date: NaiveDate,
    #[serde(alias = "timeSlot")]
    pub time_slot: String,
    #[serde(default, alias = "referredBy")]
    pub referred_by: Option<Uuid>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CompleteAppointmentRequest {
    #[serde(default)]
    pub prescription: PrescriptionInput,
    #[serde(default)]
    pub bill: BillInput,
    #[serde(default, alias = "patientUpdate")]
    pub patient_update: Option<UpdatePatientRequest>,
    #[serde(default)]
    pub reminder: Option<ReminderRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateCompletedAppointmentRequest {
    #[serde(default)]
    pub prescription: Option<PrescriptionUpdate>,
    #[serde(default)]
    pub bill: Option<BillUpdate>,
    /// Applied as a separate, audited status transition after the correction.
    #[serde(default)]
    pub status: Option<AppointmentStatus>,
    #[serde(default, alias = "statusReason")]
    pub status_reason: Option<String>,
    #[serde(default)]
    pub reminder: Option<ReminderRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusTransitionRequest {
    pub status: AppointmentStatus,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Everything written by one completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionOutcome {
    pub appointment: Appointment,
    pub prescription: Prescription,
    pub bill: Bill,
    pub patient: Patient,
    pub reminder: Option<Reminder>,
    /// Commission credited to the referring doctor, if any.
    pub referral_commission: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionOutcome {
    pub appointment: Appointment,
    pub prescription: Option<Prescription>,
    pub bill: Option<Bill>,
    pub reminder: Option<Reminder>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Prescription not found for appointment")]
    PrescriptionNotFound,

    #[error("Bill not found for appointment")]
    BillNotFound,

    #[error("Appointment already completed")]
    AlreadyCompleted,

    #[error("Appointment is {0}, only completed appointments can be corrected")]
    NotCompleted(AppointmentStatus),

    #[error("Appointment cannot move from {from} to {to}")]
    InvalidStatusTransition { from: AppointmentStatus, to: AppointmentStatus },

    #[error("Time slot already booked for this doctor and branch")]
    SlotTaken,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid bill: {0}")]
    Billing(#[from] BillingError),

    #[error("Invalid patient update: {0}")]
    Patient(#[from] PatientError),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn booking() -> BookAppointmentRequest {
        BookAppointmentRequest {
            patient_id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            branch_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            time_slot: " 10:30 ".to_string(),
            referred_by: None,
            notes: None,
        }
    }

    #[test]
    fn test_new_appointment_is_booked_with_trimmed_slot() {
        let appointment = Appointment::new(&booking(), Utc::now());
        assert_eq!(appointment.status, AppointmentStatus::Booked);
        assert_eq!(appointment.time_slot, "10:30");
        assert!(appointment.occupies_slot());
    }

    #[test]
    fn test_mark_completed_records_history() {
        let mut appointment = Appointment::new(&booking(), Utc::now());
        let (prescription_id, bill_id) = (Uuid::new_v4(), Uuid::new_v4());

        appointment.mark_completed(prescription_id, bill_id, 743.4, Some("doc-1".into()), Utc::now());

        assert_eq!(appointment.status, AppointmentStatus::Completed);
        assert_eq!(appointment.bill_id, Some(bill_id));
        assert_eq!(appointment.charges, Some(743.4));
        assert_eq!(appointment.status_history.len(), 1);
        assert_eq!(appointment.status_history[0].from, AppointmentStatus::Booked);
        assert_eq!(appointment.status_history[0].changed_by.as_deref(), Some("doc-1"));
    }

    #[test]
    fn test_follow_up_only_when_required() {
        let appointment = Appointment::new(&booking(), Utc::now());
        let date = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();

        let mut input = PrescriptionInput { follow_up_date: Some(date), ..Default::default() };
        let prescription = Prescription::from_input(&appointment, &input, Utc::now());
        assert_eq!(prescription.scheduled_follow_up(), None);

        input.follow_up_required = true;
        let prescription = Prescription::from_input(&appointment, &input, Utc::now());
        assert_eq!(prescription.scheduled_follow_up(), Some(date));
    }

    #[test]
    fn test_completion_request_accepts_dashboard_payload() {
        let request: CompleteAppointmentRequest = serde_json::from_value(json!({
            "prescription": {
                "diagnosis": "Sensorineural hearing loss",
                "symptoms": ["tinnitus"],
                "medicines": [{ "name": "Vitamin B12", "dosage": "500mcg" }],
                "followUpRequired": true,
                "followUpDate": "2024-07-01"
            },
            "bill": { "consultationFee": 300, "taxPercentage": 18 },
            "patientUpdate": { "phone": "+91-9000000002" },
            "reminder": { "date": "2024-06-30", "message": "Hearing aid trial" }
        }))
        .unwrap();

        assert!(request.prescription.follow_up_required);
        assert_eq!(request.bill.fees.consultation_fee, 300.0);
        assert!(request.patient_update.is_some());
        assert_eq!(request.reminder.unwrap().message.as_deref(), Some("Hearing aid trial"));
    }

    #[test]
    fn test_prescription_update_is_partial() {
        let appointment = Appointment::new(&booking(), Utc::now());
        let input = PrescriptionInput {
            diagnosis: "Otitis media".into(),
            treatment: "Antibiotics".into(),
            ..Default::default()
        };
        let mut prescription = Prescription::from_input(&appointment, &input, Utc::now());

        let update = PrescriptionUpdate { treatment: Some("Ear drops".into()), ..Default::default() };
        prescription.apply_update(&update, Utc::now());

        assert_eq!(prescription.diagnosis, "Otitis media");
        assert_eq!(prescription.treatment, "Ear drops");
    }
}
