use chrono::{DateTime, Utc};
use tracing::debug;

/// Commission earned on a bill total at `rate` percent. Non-positive totals or
/// rates earn nothing.
pub fn commission_for(bill_total: f64, rate: f64) -> f64 {
    if bill_total <= 0.0 || rate <= 0.0 {
        return 0.0;
    }

    let earned = bill_total * rate / 100.0;
    debug!("Commission {:.2} on bill total {:.2} at {}%", earned, bill_total, rate);
    earned
}

pub fn month_key(at: DateTime<Utc>) -> String {
    at.format("%Y-%m").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReferralDoctor;
    use chrono::TimeZone;

    #[test]
    fn test_commission_rate_applies_to_total() {
        assert!((commission_for(743.4, 10.0) - 74.34).abs() < 1e-9);
        assert_eq!(commission_for(0.0, 10.0), 0.0);
        assert_eq!(commission_for(500.0, 0.0), 0.0);
    }

    #[test]
    fn test_month_key_format() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 23, 59, 0).unwrap();
        assert_eq!(month_key(at), "2024-03");
    }

    #[test]
    fn test_credit_creates_then_increments_bucket() {
        let mut doctor = ReferralDoctor::new("Dr. Mehta", 10.0);
        let march = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let april = Utc.with_ymd_and_hms(2024, 4, 2, 10, 0, 0).unwrap();

        assert_eq!(doctor.credit_commission(1000.0, march), 100.0);
        assert_eq!(doctor.credit_commission(500.0, march), 50.0);
        assert_eq!(doctor.credit_commission(200.0, april), 20.0);

        assert_eq!(doctor.earnings_for_month("2024-03"), 150.0);
        assert_eq!(doctor.earnings_for_month("2024-04"), 20.0);
        assert_eq!(doctor.earnings_for_month("2024-05"), 0.0);
        assert_eq!(doctor.commission_amount, 170.0);
        assert_eq!(doctor.updated_at, april);
    }
}
