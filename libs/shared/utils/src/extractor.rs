use std::sync::Arc;

use axum::{
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
    body::Body,
};

use shared_models::auth::{ClinicRole, User};
use shared_models::error::AppError;
use shared_config::AppConfig;

use crate::jwt::validate_token;

/// Roles allowed to record or correct the clinical and financial outcome of a visit.
pub const CLINICAL_ROLES: &[&str] = &[
    ClinicRole::Admin.as_str(),
    ClinicRole::BranchAdmin.as_str(),
    ClinicRole::Doctor.as_str(),
];

/// Roles allowed to book appointments or edit patient records.
pub const FRONT_DESK_ROLES: &[&str] = &[
    ClinicRole::Admin.as_str(),
    ClinicRole::BranchAdmin.as_str(),
    ClinicRole::Doctor.as_str(),
    ClinicRole::Receptionist.as_str(),
];

pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let auth_value = auth_header
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    let token = auth_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))?;

    let user = validate_token(token, &config.supabase_jwt_secret)
        .map_err(|e| AppError::Auth(e.to_string()))?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Rejects users whose role is not in `roles`.
pub fn require_role(user: &User, roles: &[&str]) -> Result<(), AppError> {
    if user.has_any_role(roles) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "Role '{}' is not permitted to perform this action",
            user.role.as_deref().unwrap_or("none")
        )))
    }
}
