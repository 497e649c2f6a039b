use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use tracing::debug;

use shared_models::auth::{ClinicRole, JwtClaims, User};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TokenError {
    #[error("JWT secret is not set")]
    MissingSecret,

    #[error("Invalid token format")]
    Malformed,

    #[error("Unsupported token algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Invalid token signature")]
    BadSignature,

    #[error("Invalid token claims")]
    InvalidClaims,

    #[error("Token expired")]
    Expired,

    #[error("Role '{0}' is not a clinic role")]
    UnknownRole(String),
}

/// Verifies an HS256 Supabase access token and resolves its caller.
///
/// The clinic role comes from `app_metadata.role` when the token carries one,
/// else from the top-level `role` claim. Tokens whose role the clinic does not
/// know are rejected here, so handlers only ever see roles `require_role`
/// can reason about.
pub fn validate_token(token: &str, jwt_secret: &str) -> Result<User, TokenError> {
    if jwt_secret.is_empty() {
        return Err(TokenError::MissingSecret);
    }

    let mut parts = token.split('.');
    let (header_b64, claims_b64, signature_b64) =
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(header), Some(claims), Some(signature), None) => (header, claims, signature),
            _ => return Err(TokenError::Malformed),
        };

    let header: Value = decode_json(header_b64).ok_or(TokenError::Malformed)?;
    match header.get("alg").and_then(Value::as_str) {
        Some("HS256") => {}
        other => {
            return Err(TokenError::UnsupportedAlgorithm(
                other.unwrap_or("none").to_string(),
            ))
        }
    }

    let signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| TokenError::BadSignature)?;
    let mut mac =
        HmacSha256::new_from_slice(jwt_secret.as_bytes()).map_err(|_| TokenError::MissingSecret)?;
    mac.update(header_b64.as_bytes());
    mac.update(b".");
    mac.update(claims_b64.as_bytes());
    if mac.verify_slice(&signature).is_err() {
        debug!("Token signature verification failed");
        return Err(TokenError::BadSignature);
    }

    let claims: JwtClaims = decode_json(claims_b64).ok_or(TokenError::InvalidClaims)?;

    if let Some(exp) = claims.exp {
        let now = Utc::now().timestamp().max(0) as u64;
        if exp < now {
            debug!("Token for {} expired at {}", claims.sub, exp);
            return Err(TokenError::Expired);
        }
    }

    let role = clinic_role(&claims)?;

    Ok(User {
        id: claims.sub,
        email: claims.email,
        role: role.map(|role| role.as_str().to_string()),
        metadata: claims.user_metadata,
        created_at: claims
            .iat
            .and_then(|iat| Utc.timestamp_opt(iat as i64, 0).single()),
    })
}

fn clinic_role(claims: &JwtClaims) -> Result<Option<ClinicRole>, TokenError> {
    let assigned = claims
        .app_metadata
        .as_ref()
        .and_then(|metadata| metadata.get("role"))
        .and_then(Value::as_str);

    match assigned.or(claims.role.as_deref()) {
        Some(raw) => ClinicRole::parse(raw)
            .map(Some)
            .ok_or_else(|| TokenError::UnknownRole(raw.to_string())),
        None => Ok(None),
    }
}

fn decode_json<T: serde::de::DeserializeOwned>(segment: &str) -> Option<T> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).ok()?;
    serde_json::from_slice(&bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    use crate::test_utils::{JwtTestUtils, TestUser};

    const SECRET: &str = "test-secret-key-for-jwt-validation-must-be-long-enough";

    fn hs256() -> Value {
        json!({ "alg": "HS256", "typ": "JWT" })
    }

    #[test]
    fn test_valid_token_yields_user() {
        let test_user = TestUser::branch_admin("admin@clinic.test");
        let token = JwtTestUtils::create_test_token(&test_user, SECRET, Some(1));

        let user = validate_token(&token, SECRET).unwrap();
        assert_eq!(user.id, test_user.id);
        assert_eq!(user.role.as_deref(), Some("branch_admin"));
        assert!(user.created_at.is_some());
    }

    #[test]
    fn test_app_metadata_role_wins_over_supabase_role() {
        let claims = json!({
            "sub": "staff-7",
            "role": "authenticated",
            "app_metadata": { "role": "receptionist" }
        });
        let token = JwtTestUtils::sign(&hs256(), &claims, SECRET);

        let user = validate_token(&token, SECRET).unwrap();
        assert_eq!(user.role.as_deref(), Some("receptionist"));
    }

    #[test]
    fn test_authenticated_role_is_a_patient() {
        let claims = json!({ "sub": "patient-3", "role": "authenticated" });
        let token = JwtTestUtils::sign(&hs256(), &claims, SECRET);

        let user = validate_token(&token, SECRET).unwrap();
        assert_eq!(user.role.as_deref(), Some("patient"));
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let claims = json!({ "sub": "svc-1", "role": "service_role" });
        let token = JwtTestUtils::sign(&hs256(), &claims, SECRET);

        assert_matches!(
            validate_token(&token, SECRET),
            Err(TokenError::UnknownRole(role)) if role == "service_role"
        );
    }

    #[test]
    fn test_only_hs256_is_accepted() {
        let header = json!({ "alg": "none", "typ": "JWT" });
        let token = JwtTestUtils::sign(&header, &json!({ "sub": "x" }), SECRET);

        assert_matches!(
            validate_token(&token, SECRET),
            Err(TokenError::UnsupportedAlgorithm(alg)) if alg == "none"
        );
    }

    #[test]
    fn test_rejects_bad_tokens() {
        let test_user = TestUser::default();

        let expired = JwtTestUtils::create_expired_token(&test_user, SECRET);
        assert_matches!(validate_token(&expired, SECRET), Err(TokenError::Expired));

        let forged = JwtTestUtils::create_invalid_signature_token(&test_user);
        assert_matches!(validate_token(&forged, SECRET), Err(TokenError::BadSignature));

        let malformed = JwtTestUtils::create_malformed_token();
        assert_matches!(validate_token(&malformed, SECRET), Err(TokenError::Malformed));
        assert_matches!(validate_token("a.b.c.d", SECRET), Err(TokenError::Malformed));

        assert_matches!(validate_token("a.b.c", ""), Err(TokenError::MissingSecret));
    }
}
