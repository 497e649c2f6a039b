use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use billing_cell::Bill;
use patient_cell::{Patient, PatientRepository, SupabasePatientRepository, UpdatePatientRequest};
use shared_config::AppConfig;
use shared_database::{StoreError, SupabaseClient};

use crate::models::{Appointment, CompletionOutcome, CorrectionOutcome, Prescription};
use crate::store::{ClinicStore, CompletionCommit, CorrectionCommit, StatusCommit};

const COMPLETE_FN: &str = "complete_appointment";
const CORRECT_FN: &str = "correct_completed_appointment";
const TRANSITION_FN: &str = "transition_appointment_status";

/// PostgREST-backed store. Multi-record writes go through database functions
/// that run in one transaction; uniqueness is enforced by the schema's indexes
/// and surfaces as HTTP 409.
pub struct SupabaseStore {
    supabase: SupabaseClient,
    patients: SupabasePatientRepository,
    service_token: String,
}

impl SupabaseStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            patients: SupabasePatientRepository::new(config),
            service_token: config.supabase_service_role_key.clone(),
        }
    }

    async fn find_one<T: DeserializeOwned>(&self, table: &str, id: Uuid) -> Result<Option<T>, StoreError> {
        let path = format!("/rest/v1/{}?id=eq.{}", table, id);
        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(&self.service_token),
            None,
        ).await?;

        match rows.into_iter().next() {
            Some(row) => Ok(Some(serde_json::from_value(row)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl PatientRepository for SupabaseStore {
    async fn find_patient(&self, patient_id: Uuid) -> Result<Option<Patient>, StoreError> {
        self.patients.find_patient(patient_id).await
    }

    async fn update_patient(
        &self,
        patient_id: Uuid,
        update: &UpdatePatientRequest,
    ) -> Result<Patient, StoreError> {
        self.patients.update_patient(patient_id, update).await
    }
}

#[async_trait]
impl ClinicStore for SupabaseStore {
    async fn find_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError> {
        debug!("Fetching appointment {}", appointment_id);
        self.find_one("appointments", appointment_id).await
    }

    async fn insert_appointment(&self, appointment: &Appointment) -> Result<Appointment, StoreError> {
        debug!("Inserting appointment {}", appointment.id);

        let rows: Vec<Value> = self.supabase.write_returning(
            Method::POST,
            "/rest/v1/appointments",
            Some(&self.service_token),
            serde_json::to_value(appointment)?,
        ).await?;

        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Database("Insert returned no appointment".to_string()))?;
        Ok(serde_json::from_value(row)?)
    }

    async fn find_prescription(&self, prescription_id: Uuid) -> Result<Option<Prescription>, StoreError> {
        self.find_one("prescriptions", prescription_id).await
    }

    async fn find_bill(&self, bill_id: Uuid) -> Result<Option<Bill>, StoreError> {
        self.find_one("bills", bill_id).await
    }

    async fn bill_number_exists(&self, bill_number: &str) -> Result<bool, StoreError> {
        let path = format!("/rest/v1/bills?bill_number=eq.{}&select=id", bill_number);
        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(&self.service_token),
            None,
        ).await?;

        Ok(!rows.is_empty())
    }

    async fn commit_completion(&self, commit: CompletionCommit) -> Result<CompletionOutcome, StoreError> {
        debug!("Calling {} for appointment {}", COMPLETE_FN, commit.appointment.id);

        let outcome = self.supabase.rpc(
            COMPLETE_FN,
            Some(&self.service_token),
            json!({ "commit": commit }),
        ).await?;
        Ok(outcome)
    }

    async fn commit_correction(&self, commit: CorrectionCommit) -> Result<CorrectionOutcome, StoreError> {
        debug!("Calling {} for appointment {}", CORRECT_FN, commit.appointment_id);

        let outcome = self.supabase.rpc(
            CORRECT_FN,
            Some(&self.service_token),
            json!({ "commit": commit }),
        ).await?;
        Ok(outcome)
    }

    async fn commit_status_change(&self, commit: StatusCommit) -> Result<Appointment, StoreError> {
        debug!("Calling {} for appointment {}", TRANSITION_FN, commit.appointment_id);

        let appointment = self.supabase.rpc(
            TRANSITION_FN,
            Some(&self.service_token),
            json!({ "commit": commit }),
        ).await?;
        Ok(appointment)
    }
}
