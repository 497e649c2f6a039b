// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::StoreError;

use crate::models::{Appointment, AppointmentError, BookAppointmentRequest};
use crate::store::ClinicStore;

pub struct AppointmentBookingService {
    store: Arc<dyn ClinicStore>,
}

impl AppointmentBookingService {
    pub fn new(store: Arc<dyn ClinicStore>) -> Self {
        Self { store }
    }

    /// Books a slot. The store enforces uniqueness of
    /// (doctor, branch, date, time slot) among non-cancelled appointments.
    pub async fn book_appointment(
        &self,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        info!("Booking appointment for patient {} with doctor {} on {} at {}",
              request.patient_id, request.doctor_id, request.date, request.time_slot);

        Self::validate_booking_request(&request)?;
        self.verify_patient_exists(request.patient_id).await?;

        let appointment = Appointment::new(&request, Utc::now());

        let stored = self.store.insert_appointment(&appointment).await.map_err(|e| match e {
            StoreError::Conflict(msg) => {
                warn!("Slot conflict for doctor {}: {}", request.doctor_id, msg);
                AppointmentError::SlotTaken
            }
            other => other.into(),
        })?;

        info!("Appointment {} booked successfully", stored.id);
        Ok(stored)
    }

    pub async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        debug!("Fetching appointment: {}", appointment_id);

        self.store
            .find_appointment(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)
    }

    fn validate_booking_request(request: &BookAppointmentRequest) -> Result<(), AppointmentError> {
        let slot = request.time_slot.trim();
        if slot.is_empty() {
            return Err(AppointmentError::ValidationError("time_slot is required".to_string()));
        }
        if slot.len() > 32 {
            return Err(AppointmentError::ValidationError(format!(
                "time_slot '{}' is too long", slot
            )));
        }
        Ok(())
    }

    async fn verify_patient_exists(&self, patient_id: Uuid) -> Result<(), AppointmentError> {
        match self.store.find_patient(patient_id).await? {
            Some(_) => Ok(()),
            None => Err(AppointmentError::PatientNotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::NaiveDate;
    use patient_cell::{Patient, PatientPlan};

    use crate::models::AppointmentStatus;
    use crate::store::MemoryStore;

    async fn service_with_patient() -> (AppointmentBookingService, Patient) {
        let store = MemoryStore::new();
        let patient = Patient::new("Ravi", PatientPlan::default());
        store.insert_patient(patient.clone()).await;
        (AppointmentBookingService::new(Arc::new(store)), patient)
    }

    fn request_for(patient_id: Uuid, doctor_id: Uuid, branch_id: Uuid) -> BookAppointmentRequest {
        BookAppointmentRequest {
            patient_id,
            doctor_id,
            branch_id,
            date: NaiveDate::from_ymd_opt(2024, 5, 20).unwrap(),
            time_slot: "11:00".to_string(),
            referred_by: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_double_booking_is_rejected() {
        let (service, patient) = service_with_patient().await;
        let (doctor, branch) = (Uuid::new_v4(), Uuid::new_v4());

        let first = service.book_appointment(request_for(patient.id, doctor, branch)).await.unwrap();
        assert_eq!(first.status, AppointmentStatus::Booked);

        let second = service.book_appointment(request_for(patient.id, doctor, branch)).await;
        assert_matches!(second, Err(AppointmentError::SlotTaken));
    }

    #[tokio::test]
    async fn test_same_slot_with_other_doctor_is_allowed() {
        let (service, patient) = service_with_patient().await;
        let branch = Uuid::new_v4();

        service.book_appointment(request_for(patient.id, Uuid::new_v4(), branch)).await.unwrap();
        let other = service.book_appointment(request_for(patient.id, Uuid::new_v4(), branch)).await;
        assert!(other.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_patient_and_blank_slot() {
        let (service, patient) = service_with_patient().await;

        let unknown = request_for(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        assert_matches!(service.book_appointment(unknown).await, Err(AppointmentError::PatientNotFound));

        let mut blank = request_for(patient.id, Uuid::new_v4(), Uuid::new_v4());
        blank.time_slot = "   ".to_string();
        assert_matches!(service.book_appointment(blank).await, Err(AppointmentError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_concurrent_bookings_for_one_slot() {
        let (service, patient) = service_with_patient().await;
        let service = Arc::new(service);
        let (doctor, branch) = (Uuid::new_v4(), Uuid::new_v4());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = Arc::clone(&service);
                let request = request_for(patient.id, doctor, branch);
                tokio::spawn(async move { service.book_appointment(request).await })
            })
            .collect();

        let mut booked = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                booked += 1;
            }
        }
        assert_eq!(booked, 1);
    }
}
