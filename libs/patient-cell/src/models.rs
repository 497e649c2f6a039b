use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use billing_cell::WalletTerms;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    #[default]
    Standard,
    Wallet,
    Custom,
}

/// Commercial plan attached to a patient. Only `Wallet` plans carry a
/// prepaid balance that appointment completion draws from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct PatientPlan {
    #[serde(rename = "type", default)]
    pub plan_type: PlanType,
    #[serde(default, alias = "walletAmount")]
    pub wallet_amount: f64,
    #[serde(default, alias = "visitsRemaining")]
    pub visits_remaining: i32,
    #[serde(default, alias = "perVisitCharge")]
    pub per_visit_charge: f64,
}

impl PatientPlan {
    pub fn wallet(wallet_amount: f64, per_visit_charge: f64, visits_remaining: i32) -> Self {
        Self {
            plan_type: PlanType::Wallet,
            wallet_amount,
            visits_remaining,
            per_visit_charge,
        }
    }

    pub fn is_wallet(&self) -> bool {
        self.plan_type == PlanType::Wallet
    }

    /// The plan's per-visit charge replaces the requested consultation fee
    /// for wallet plans that define one.
    pub fn effective_visit_charge(&self, requested_fee: f64) -> f64 {
        if self.is_wallet() && self.per_visit_charge > 0.0 {
            self.per_visit_charge
        } else {
            requested_fee
        }
    }

    pub fn wallet_terms(&self, visit_charge: f64) -> Option<WalletTerms> {
        self.is_wallet().then_some(WalletTerms {
            balance: self.wallet_amount,
            visit_charge,
        })
    }

    pub fn can_cover(&self, visit_charge: f64) -> bool {
        self.is_wallet() && self.wallet_amount >= visit_charge
    }

    /// Deducts one visit if the balance covers it. Returns whether anything
    /// was deducted; the balance never goes negative.
    pub fn deduct_visit(&mut self, visit_charge: f64) -> bool {
        if !self.can_cover(visit_charge) {
            return false;
        }

        self.wallet_amount -= visit_charge;
        self.visits_remaining = (self.visits_remaining - 1).max(0);
        true
    }

    pub fn validate(&self) -> Result<(), PatientError> {
        if !self.wallet_amount.is_finite() || self.wallet_amount < 0.0 {
            return Err(PatientError::ValidationError(
                "plan.wallet_amount must be a non-negative amount".to_string(),
            ));
        }
        if !self.per_visit_charge.is_finite() || self.per_visit_charge < 0.0 {
            return Err(PatientError::ValidationError(
                "plan.per_visit_charge must be a non-negative amount".to_string(),
            ));
        }
        if self.visits_remaining < 0 {
            return Err(PatientError::ValidationError(
                "plan.visits_remaining cannot be negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub branch_id: Option<Uuid>,
    #[serde(default)]
    pub plan: PatientPlan,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    pub fn new(name: &str, plan: PatientPlan) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: None,
            phone: None,
            age: None,
            gender: None,
            address: None,
            branch_id: None,
            plan,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_update(&mut self, update: &UpdatePatientRequest, now: DateTime<Utc>) {
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(email) = &update.email {
            self.email = Some(email.clone());
        }
        if let Some(phone) = &update.phone {
            self.phone = Some(phone.clone());
        }
        if let Some(age) = update.age {
            self.age = Some(age);
        }
        if let Some(gender) = &update.gender {
            self.gender = Some(gender.clone());
        }
        if let Some(address) = &update.address {
            self.address = Some(address.clone());
        }
        if let Some(plan) = update.plan {
            self.plan = plan;
        }
        self.updated_at = now;
    }
}

/// Demographic edits and/or a replacement plan. Absent fields are untouched.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UpdatePatientRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub plan: Option<PatientPlan>,
}

impl UpdatePatientRequest {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<(), PatientError> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(PatientError::ValidationError("name cannot be blank".to_string()));
            }
        }
        if let Some(email) = &self.email {
            if !email.contains('@') {
                return Err(PatientError::ValidationError(format!("invalid email address: {}", email)));
            }
        }
        match &self.plan {
            Some(plan) => plan.validate(),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error, PartialEq)]
pub enum PatientError {
    #[error("Patient not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wallet_plan_overrides_consultation_fee() {
        let plan = PatientPlan::wallet(1000.0, 500.0, 2);
        assert_eq!(plan.effective_visit_charge(300.0), 500.0);
        assert_eq!(plan.effective_visit_charge(900.0), 500.0);
    }

    #[test]
    fn test_zero_per_visit_charge_keeps_requested_fee() {
        let plan = PatientPlan::wallet(1000.0, 0.0, 2);
        assert_eq!(plan.effective_visit_charge(300.0), 300.0);

        let standard = PatientPlan { per_visit_charge: 500.0, ..Default::default() };
        assert_eq!(standard.effective_visit_charge(300.0), 300.0);
        assert!(standard.wallet_terms(300.0).is_none());
    }

    #[test]
    fn test_deduct_visit_sequence() {
        let mut plan = PatientPlan::wallet(1000.0, 500.0, 2);

        assert!(plan.deduct_visit(500.0));
        assert_eq!(plan.wallet_amount, 500.0);
        assert_eq!(plan.visits_remaining, 1);

        assert!(plan.deduct_visit(500.0));
        assert_eq!(plan.wallet_amount, 0.0);
        assert_eq!(plan.visits_remaining, 0);

        assert!(!plan.deduct_visit(500.0));
        assert_eq!(plan.wallet_amount, 0.0);
        assert_eq!(plan.visits_remaining, 0);
    }

    #[test]
    fn test_visits_remaining_floors_at_zero() {
        let mut plan = PatientPlan::wallet(1000.0, 100.0, 0);
        assert!(plan.deduct_visit(100.0));
        assert_eq!(plan.visits_remaining, 0);
    }

    #[test]
    fn test_plan_deserializes_type_field() {
        let plan: PatientPlan = serde_json::from_value(json!({
            "type": "wallet",
            "walletAmount": 1500,
            "visitsRemaining": 3,
            "perVisitCharge": 500
        }))
        .unwrap();

        assert!(plan.is_wallet());
        assert_eq!(plan.wallet_amount, 1500.0);
        assert_eq!(plan.visits_remaining, 3);
    }

    #[test]
    fn test_apply_update_replaces_plan() {
        let mut patient = Patient::new("Asha", PatientPlan::default());
        let update = UpdatePatientRequest {
            phone: Some("+91-9876543210".to_string()),
            plan: Some(PatientPlan::wallet(2000.0, 400.0, 5)),
            ..Default::default()
        };

        patient.apply_update(&update, Utc::now());
        assert_eq!(patient.phone.as_deref(), Some("+91-9876543210"));
        assert_eq!(patient.plan.per_visit_charge, 400.0);
        assert_eq!(patient.name, "Asha");
    }

    #[test]
    fn test_update_validation() {
        let bad_plan = UpdatePatientRequest {
            plan: Some(PatientPlan::wallet(-10.0, 100.0, 1)),
            ..Default::default()
        };
        assert!(bad_plan.validate().is_err());

        let blank = UpdatePatientRequest { name: Some("  ".to_string()), ..Default::default() };
        assert!(blank.validate().is_err());

        assert!(UpdatePatientRequest::default().is_empty());
    }
}
