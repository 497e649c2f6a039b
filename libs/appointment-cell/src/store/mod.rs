pub mod memory;
pub mod supabase;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use billing_cell::{Bill, PaymentRequest};
use patient_cell::{PatientRepository, UpdatePatientRequest};
use shared_database::StoreError;

use crate::models::{
    Appointment, CompletionOutcome, CorrectionOutcome, Prescription, Reminder,
    StatusChange,
};

pub use memory::MemoryStore;
pub use supabase::SupabaseStore;

/// Write set of one appointment completion. Applied all-or-nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionCommit {
    /// Already marked completed; the store checks the stored row is still booked.
    pub appointment: Appointment,
    pub prescription: Prescription,
    /// Priced from the patient as read before the commit. The store settles
    /// its payment again against the wallet it holds under the write.
    pub bill: Bill,
    /// What the caller asked for; wallet auto-pay is decided at commit time.
    pub payment: PaymentRequest,
    pub patient_update: Option<UpdatePatientRequest>,
    /// Visit charge to draw from a wallet plan, if the patient has one.
    pub wallet_charge: Option<f64>,
    pub referral_doctor_id: Option<Uuid>,
    pub reminder: Option<Reminder>,
}

/// Corrected records of a completed appointment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionCommit {
    pub appointment_id: Uuid,
    pub prescription: Option<Prescription>,
    pub bill: Option<Bill>,
    pub reminder: Option<Reminder>,
    /// Applied after the corrected records, within the same commit.
    pub status_change: Option<StatusChange>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusCommit {
    pub appointment_id: Uuid,
    pub change: StatusChange,
}

/// Persistence seam for appointments and everything a completion writes.
///
/// Every `commit_*` call is atomic: the expected appointment status is
/// re-checked and the whole write set lands, or nothing does.
#[async_trait]
pub trait ClinicStore: PatientRepository {
    async fn find_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError>;

    /// Fails with `Conflict` when a non-cancelled appointment holds the slot.
    async fn insert_appointment(&self, appointment: &Appointment) -> Result<Appointment, StoreError>;

    async fn find_prescription(&self, prescription_id: Uuid) -> Result<Option<Prescription>, StoreError>;

    async fn find_bill(&self, bill_id: Uuid) -> Result<Option<Bill>, StoreError>;

    async fn bill_number_exists(&self, bill_number: &str) -> Result<bool, StoreError>;

    async fn commit_completion(&self, commit: CompletionCommit) -> Result<CompletionOutcome, StoreError>;

    async fn commit_correction(&self, commit: CorrectionCommit) -> Result<CorrectionOutcome, StoreError>;

    async fn commit_status_change(&self, commit: StatusCommit) -> Result<Appointment, StoreError>;
}
