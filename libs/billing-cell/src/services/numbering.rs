use chrono::NaiveDate;
use rand::Rng;

const PREFIX: &str = "BILL";

/// Issues `BILL-YYYYMMDD-NNN` numbers. The three-digit suffix is random, so
/// uniqueness is best-effort; callers re-roll on collision.
#[derive(Debug, Default, Clone, Copy)]
pub struct BillNumberGenerator;

impl BillNumberGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self, date: NaiveDate) -> String {
        self.generate_with(date, &mut rand::thread_rng())
    }

    pub fn generate_with<R: Rng + ?Sized>(&self, date: NaiveDate, rng: &mut R) -> String {
        let suffix: u16 = rng.gen_range(0..1000);
        format!("{}-{}-{:03}", PREFIX, date.format("%Y%m%d"), suffix)
    }

    pub fn is_well_formed(number: &str) -> bool {
        let mut parts = number.split('-');
        let (Some(prefix), Some(date), Some(suffix), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return false;
        };

        prefix == PREFIX
            && NaiveDate::parse_from_str(date, "%Y%m%d").is_ok()
            && suffix.len() == 3
            && suffix.chars().all(|c| c.is_ascii_digit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_number_format() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let number = BillNumberGenerator::new().generate(date);

        assert!(number.starts_with("BILL-20240309-"));
        assert_eq!(number.len(), "BILL-20240309-000".len());
        assert!(BillNumberGenerator::is_well_formed(&number));
    }

    #[test]
    fn test_suffix_is_zero_padded() {
        let date = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let number = BillNumberGenerator::new().generate_with(date, &mut rng);
            assert!(BillNumberGenerator::is_well_formed(&number), "{}", number);
        }
    }

    #[test]
    fn test_rejects_malformed_numbers() {
        assert!(!BillNumberGenerator::is_well_formed("BILL-20240309-12"));
        assert!(!BillNumberGenerator::is_well_formed("INV-20240309-123"));
        assert!(!BillNumberGenerator::is_well_formed("BILL-20241399-123"));
        assert!(!BillNumberGenerator::is_well_formed("BILL-20240309-123-1"));
    }
}
