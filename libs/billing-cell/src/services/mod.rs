pub mod calculator;
pub mod numbering;

pub use calculator::{BillCalculator, BillContext, PaymentResolution};
pub use numbering::BillNumberGenerator;
