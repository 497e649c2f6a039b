use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::commission;

/// An outside doctor who refers patients and earns a share of their bills.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReferralDoctor {
    pub id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub specialization: Option<String>,
    /// Percentage of each referred bill's total.
    #[serde(alias = "commissionRate")]
    pub commission_rate: f64,
    /// Running total across all months.
    #[serde(default, alias = "commissionAmount")]
    pub commission_amount: f64,
    /// Earnings keyed by calendar month, `YYYY-MM`.
    #[serde(default, alias = "monthlyEarnings")]
    pub monthly_earnings: BTreeMap<String, f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReferralDoctor {
    pub fn new(name: &str, commission_rate: f64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            phone: None,
            specialization: None,
            commission_rate,
            commission_amount: 0.0,
            monthly_earnings: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Credits the commission on a referred bill to the running total and to
    /// the bucket for the month of `at`. Returns the credited amount.
    pub fn credit_commission(&mut self, bill_total: f64, at: DateTime<Utc>) -> f64 {
        let earned = commission::commission_for(bill_total, self.commission_rate);

        self.commission_amount += earned;
        *self
            .monthly_earnings
            .entry(commission::month_key(at))
            .or_insert(0.0) += earned;
        self.updated_at = at;

        earned
    }

    pub fn earnings_for_month(&self, month: &str) -> f64 {
        self.monthly_earnings.get(month).copied().unwrap_or(0.0)
    }
}
