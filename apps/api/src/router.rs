use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::appointment_routes;
use appointment_cell::store::ClinicStore;
use billing_cell::billing_routes;
use patient_cell::{create_patient_router, PatientRepository};
use shared_config::AppConfig;

pub fn create_router(
    state: Arc<AppConfig>,
    store: Arc<dyn ClinicStore>,
    patients: Arc<dyn PatientRepository>,
) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic API is running!" }))
        .nest("/appointments", appointment_routes(state.clone(), store))
        .nest("/billing", billing_routes(state.clone()))
        .nest("/patients", create_patient_router(state, patients))
}

#[cfg(test)]
mod tests {
    use super::*;
    use appointment_cell::store::MemoryStore;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use shared_utils::test_utils::{TestConfig, TestUser};
    use tower::ServiceExt;

    fn app(config: &TestConfig) -> Router {
        let store = Arc::new(MemoryStore::new());
        create_router(config.to_arc(), store.clone(), store)
    }

    #[tokio::test]
    async fn test_liveness() {
        let response = app(&TestConfig::default())
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Clinic API is running!");
    }

    #[tokio::test]
    async fn test_cells_are_mounted_behind_auth() {
        let config = TestConfig::default();
        let patient_id = "00000000-0000-0000-0000-000000000001";

        for uri in [format!("/appointments/{}", patient_id), format!("/patients/{}", patient_id)] {
            let response = app(&config)
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[tokio::test]
    async fn test_billing_preview_is_reachable() {
        let config = TestConfig::default();
        let request = Request::builder()
            .method("POST")
            .uri("/billing/preview")
            .header("Authorization", config.bearer_for(&TestUser::receptionist("desk@clinic.test")))
            .header("content-type", "application/json")
            .body(Body::from(json!({ "bill": { "consultationFee": 300 } }).to_string()))
            .unwrap();

        let response = app(&config).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
