// libs/billing-cell/src/services/calculator.rs
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::models::{
    Bill, BillInput, BillTotals, DeviceLine, DiscountTerms, FeeSchedule, PaymentMethod,
    PaymentStatus, ServiceLine, WalletTerms,
};

pub fn services_total(services: &[ServiceLine]) -> f64 {
    services.iter().map(ServiceLine::line_total).sum()
}

pub fn devices_total(devices: &[DeviceLine]) -> f64 {
    devices.iter().map(DeviceLine::line_total).sum()
}

/// Subtotal, discount and tax derivation shared by new bills and corrections.
pub fn compute_totals(
    fees: &FeeSchedule,
    services: &[ServiceLine],
    devices: &[DeviceLine],
    discount: &DiscountTerms,
    tax_percentage: f64,
) -> BillTotals {
    let services_total = services_total(services);
    let devices_total = devices_total(devices);
    let subtotal = fees.sum() + services_total + devices_total;

    let discount_amount = discount.amount_for(subtotal);
    let taxable_amount = subtotal - discount_amount;
    let tax = taxable_amount * tax_percentage / 100.0;

    BillTotals {
        services_total,
        devices_total,
        subtotal,
        discount_amount,
        taxable_amount,
        tax,
        total_amount: taxable_amount + tax,
    }
}

pub fn payment_status(total_amount: f64, paid_amount: f64) -> PaymentStatus {
    if total_amount > 0.0 && paid_amount >= total_amount {
        PaymentStatus::Paid
    } else if paid_amount > 0.0 && paid_amount < total_amount {
        PaymentStatus::Partial
    } else {
        PaymentStatus::Pending
    }
}

/// Who pays for the visit and how much.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaymentResolution {
    pub method: PaymentMethod,
    pub paid_amount: f64,
    pub paid_from_wallet: bool,
}

/// A wallet plan pays the visit charge on its own only when the caller gave
/// no explicit amount and the balance covers it.
pub fn resolve_payment(
    requested_method: Option<PaymentMethod>,
    requested_paid: Option<f64>,
    wallet: Option<&WalletTerms>,
) -> PaymentResolution {
    match (requested_paid, wallet) {
        (None, Some(terms)) if terms.covers_visit() => PaymentResolution {
            method: PaymentMethod::Wallet,
            paid_amount: terms.visit_charge,
            paid_from_wallet: true,
        },
        _ => PaymentResolution {
            method: requested_method.unwrap_or_default(),
            paid_amount: requested_paid.unwrap_or(0.0),
            paid_from_wallet: false,
        },
    }
}

/// Identity of the bill being issued.
#[derive(Debug, Clone)]
pub struct BillContext {
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub branch_id: Uuid,
    pub bill_number: String,
    pub issued_at: DateTime<Utc>,
}

pub struct BillCalculator;

impl BillCalculator {
    /// Builds a bill whose consultation line is `consultation_fee`, which may
    /// differ from the requested fee when a plan prices the visit.
    pub fn build_bill(
        context: BillContext,
        input: &BillInput,
        consultation_fee: f64,
        wallet: Option<&WalletTerms>,
    ) -> Bill {
        let request = input.payment_request();
        let payment = resolve_payment(request.method, request.paid_amount, wallet);

        let mut bill = Bill {
            id: Uuid::new_v4(),
            bill_number: context.bill_number,
            appointment_id: context.appointment_id,
            patient_id: context.patient_id,
            doctor_id: context.doctor_id,
            branch_id: context.branch_id,
            fees: FeeSchedule { consultation_fee, ..input.fees },
            services: input.services.clone(),
            devices: input.devices.clone(),
            discount: input.discount,
            discount_amount: 0.0,
            tax_percentage: input.tax_percentage,
            services_total: 0.0,
            devices_total: 0.0,
            subtotal: 0.0,
            tax: 0.0,
            total_amount: 0.0,
            paid_amount: payment.paid_amount,
            remaining_amount: 0.0,
            payment_method: payment.method,
            payment_status: PaymentStatus::Pending,
            wallet_deduction: 0.0,
            notes: input.notes.clone(),
            created_at: context.issued_at,
            updated_at: context.issued_at,
        };
        bill.recalculate();

        debug!(
            "Computed bill {}: subtotal {:.2}, discount {:.2}, tax {:.2}, total {:.2}, paid {:.2} via {}",
            bill.bill_number, bill.subtotal, bill.discount_amount, bill.tax,
            bill.total_amount, bill.paid_amount, bill.payment_method
        );

        bill
    }

    /// Totals only, without issuing a bill.
    pub fn preview(input: &BillInput, consultation_fee: f64) -> BillTotals {
        let fees = FeeSchedule { consultation_fee, ..input.fees };
        compute_totals(&fees, &input.services, &input.devices, &input.discount, input.tax_percentage)
    }
}
