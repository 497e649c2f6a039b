use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use shared_database::StoreError;

use crate::models::{Patient, PatientError, UpdatePatientRequest};
use crate::services::repository::PatientRepository;

pub struct PatientService {
    repository: Arc<dyn PatientRepository>,
}

impl From<StoreError> for PatientError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => PatientError::NotFound,
            other => PatientError::DatabaseError(other.to_string()),
        }
    }
}

impl PatientService {
    pub fn new(repository: Arc<dyn PatientRepository>) -> Self {
        Self { repository }
    }

    pub async fn get_patient(&self, patient_id: Uuid) -> Result<Patient, PatientError> {
        debug!("Fetching patient profile: {}", patient_id);

        self.repository
            .find_patient(patient_id)
            .await?
            .ok_or(PatientError::NotFound)
    }

    pub async fn update_patient(
        &self,
        patient_id: Uuid,
        request: UpdatePatientRequest,
    ) -> Result<Patient, PatientError> {
        request.validate()?;

        if request.is_empty() {
            return self.get_patient(patient_id).await;
        }

        let patient = self.repository.update_patient(patient_id, &request).await?;
        info!("Patient {} updated (plan changed: {})", patient_id, request.plan.is_some());

        Ok(patient)
    }
}
