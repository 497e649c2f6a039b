use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{StoreError, SupabaseClient};

use crate::models::{Patient, UpdatePatientRequest};

/// Persistence seam for patient records.
#[async_trait]
pub trait PatientRepository: Send + Sync {
    async fn find_patient(&self, patient_id: Uuid) -> Result<Option<Patient>, StoreError>;

    async fn update_patient(
        &self,
        patient_id: Uuid,
        update: &UpdatePatientRequest,
    ) -> Result<Patient, StoreError>;
}

pub struct SupabasePatientRepository {
    supabase: SupabaseClient,
    service_token: String,
}

impl SupabasePatientRepository {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            service_token: config.supabase_service_role_key.clone(),
        }
    }

    fn update_body(update: &UpdatePatientRequest) -> Result<Value, StoreError> {
        let mut update_data = serde_json::Map::new();

        if let Some(name) = &update.name {
            update_data.insert("name".to_string(), json!(name));
        }
        if let Some(email) = &update.email {
            update_data.insert("email".to_string(), json!(email));
        }
        if let Some(phone) = &update.phone {
            update_data.insert("phone".to_string(), json!(phone));
        }
        if let Some(age) = update.age {
            update_data.insert("age".to_string(), json!(age));
        }
        if let Some(gender) = &update.gender {
            update_data.insert("gender".to_string(), json!(gender));
        }
        if let Some(address) = &update.address {
            update_data.insert("address".to_string(), json!(address));
        }
        if let Some(plan) = &update.plan {
            update_data.insert("plan".to_string(), serde_json::to_value(plan)?);
        }

        update_data.insert("updated_at".to_string(), json!(chrono::Utc::now().to_rfc3339()));
        Ok(Value::Object(update_data))
    }
}

#[async_trait]
impl PatientRepository for SupabasePatientRepository {
    async fn find_patient(&self, patient_id: Uuid) -> Result<Option<Patient>, StoreError> {
        debug!("Fetching patient record: {}", patient_id);

        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(&self.service_token),
            None,
        ).await?;

        match result.into_iter().next() {
            Some(row) => Ok(Some(serde_json::from_value(row)?)),
            None => Ok(None),
        }
    }

    async fn update_patient(
        &self,
        patient_id: Uuid,
        update: &UpdatePatientRequest,
    ) -> Result<Patient, StoreError> {
        debug!("Updating patient record: {}", patient_id);

        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        let result: Vec<Value> = self.supabase.write_returning(
            Method::PATCH,
            &path,
            Some(&self.service_token),
            Self::update_body(update)?,
        ).await?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(format!("Patient {}", patient_id)))?;

        Ok(serde_json::from_value(row)?)
    }
}
