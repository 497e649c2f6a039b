use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

/// Roles the clinic recognises. Supabase's generic `authenticated` role is a
/// signed-in patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClinicRole {
    Admin,
    BranchAdmin,
    Doctor,
    Receptionist,
    Patient,
}

impl ClinicRole {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Self::Admin),
            "branch_admin" => Some(Self::BranchAdmin),
            "doctor" => Some(Self::Doctor),
            "receptionist" => Some(Self::Receptionist),
            "patient" | "authenticated" => Some(Self::Patient),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::BranchAdmin => "branch_admin",
            Self::Doctor => "doctor",
            Self::Receptionist => "receptionist",
            Self::Patient => "patient",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn has_role(&self, role: &str) -> bool {
        self.role.as_deref() == Some(role)
    }

    pub fn has_any_role(&self, roles: &[&str]) -> bool {
        roles.iter().any(|role| self.has_role(role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clinic_roles_round_trip_through_their_names() {
        for role in [
            ClinicRole::Admin,
            ClinicRole::BranchAdmin,
            ClinicRole::Doctor,
            ClinicRole::Receptionist,
            ClinicRole::Patient,
        ] {
            assert_eq!(ClinicRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(ClinicRole::parse("authenticated"), Some(ClinicRole::Patient));
        assert_eq!(ClinicRole::parse("service_role"), None);
    }
}
