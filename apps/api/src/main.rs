use std::net::SocketAddr;
use std::sync::Arc;
use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::{self, TraceLayer};
use tracing::{Level, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::store::{ClinicStore, MemoryStore, SupabaseStore};
use patient_cell::{PatientRepository, SupabasePatientRepository};
use shared_config::{AppConfig, StoreBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clinic API server");

    // Load configuration
    let config = Arc::new(AppConfig::from_env());

    let (store, patients) = build_stores(&config);
    info!("Using {} store", config.store_backend);

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(config.clone(), store, patients)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new()
                    .level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new()
                    .level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app)
        .await
        .context("server error")?;

    Ok(())
}

fn build_stores(config: &AppConfig) -> (Arc<dyn ClinicStore>, Arc<dyn PatientRepository>) {
    match config.store_backend {
        StoreBackend::Memory => {
            warn!("Memory store selected, records are lost on restart");
            let store = Arc::new(MemoryStore::new());
            let clinic: Arc<dyn ClinicStore> = store.clone();
            let patients: Arc<dyn PatientRepository> = store;
            (clinic, patients)
        }
        StoreBackend::Supabase => (
            Arc::new(SupabaseStore::new(config)),
            Arc::new(SupabasePatientRepository::new(config)),
        ),
    }
}
