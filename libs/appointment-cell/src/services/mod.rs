pub mod booking;
pub mod completion;
pub mod correction;
pub mod lifecycle;

use shared_database::StoreError;

use crate::models::AppointmentError;

pub use booking::AppointmentBookingService;
pub use completion::CompletionService;
pub use correction::CorrectionService;
pub use lifecycle::{AppointmentLifecycleService, StatusTransitionService};

impl From<StoreError> for AppointmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => AppointmentError::NotFound,
            StoreError::Conflict(msg) => AppointmentError::Conflict(msg),
            StoreError::Database(msg) => AppointmentError::DatabaseError(msg),
        }
    }
}
