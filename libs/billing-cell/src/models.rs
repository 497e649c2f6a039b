// libs/billing-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// ENUMS
// ==============================================================================

/// How a discount value is interpreted. `General` and `Fixed` both treat
/// `discount` as a flat amount; only `Percentage` reads `discount_percentage`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Fixed,
    Percentage,
    #[default]
    General,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Partial,
    Cancelled,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Paid => write!(f, "paid"),
            PaymentStatus::Partial => write!(f, "partial"),
            PaymentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    Upi,
    #[serde(alias = "bank-transfer", alias = "bankTransfer")]
    BankTransfer,
    Cheque,
    Wallet,
    Insurance,
    #[serde(other)]
    Other,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentMethod::Cash => write!(f, "cash"),
            PaymentMethod::Card => write!(f, "card"),
            PaymentMethod::Upi => write!(f, "upi"),
            PaymentMethod::BankTransfer => write!(f, "bank_transfer"),
            PaymentMethod::Cheque => write!(f, "cheque"),
            PaymentMethod::Wallet => write!(f, "wallet"),
            PaymentMethod::Insurance => write!(f, "insurance"),
            PaymentMethod::Other => write!(f, "other"),
        }
    }
}

// ==============================================================================
// LINE ITEMS
// ==============================================================================

/// Itemized per-visit fees. All default to zero.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct FeeSchedule {
    #[serde(default, alias = "consultationFee")]
    pub consultation_fee: f64,
    #[serde(default, alias = "treatmentFee")]
    pub treatment_fee: f64,
    #[serde(default, alias = "medicineFee")]
    pub medicine_fee: f64,
    #[serde(default, alias = "otherCharges")]
    pub other_charges: f64,
    #[serde(default, alias = "hearingAidFee")]
    pub hearing_aid_fee: f64,
    #[serde(default, alias = "audiometryFee")]
    pub audiometry_fee: f64,
}

impl FeeSchedule {
    pub fn sum(&self) -> f64 {
        self.consultation_fee
            + self.treatment_fee
            + self.medicine_fee
            + self.other_charges
            + self.hearing_aid_fee
            + self.audiometry_fee
    }

    fn named_amounts(&self) -> [(&'static str, f64); 6] {
        [
            ("consultation_fee", self.consultation_fee),
            ("treatment_fee", self.treatment_fee),
            ("medicine_fee", self.medicine_fee),
            ("other_charges", self.other_charges),
            ("hearing_aid_fee", self.hearing_aid_fee),
            ("audiometry_fee", self.audiometry_fee),
        ]
    }
}

/// Bill-level discount descriptor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct DiscountTerms {
    #[serde(default, alias = "discountType")]
    pub discount_type: DiscountType,
    #[serde(default)]
    pub discount: f64,
    #[serde(default, alias = "discountPercentage")]
    pub discount_percentage: f64,
}

impl DiscountTerms {
    pub fn amount_for(&self, base: f64) -> f64 {
        match self.discount_type {
            DiscountType::Percentage => base * self.discount_percentage / 100.0,
            DiscountType::Fixed | DiscountType::General => self.discount,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ServiceLine {
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "basePrice")]
    pub base_price: Option<f64>,
    #[serde(default, alias = "actualPrice")]
    pub actual_price: Option<f64>,
    /// Older clients send a single `price`.
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub discount: f64,
    #[serde(default, alias = "discountPercentage")]
    pub discount_percentage: f64,
    #[serde(default, alias = "discountType")]
    pub discount_type: DiscountType,
}

impl ServiceLine {
    /// Price charged before the line's own discount:
    /// `actual_price`, else `base_price`, else the legacy `price`.
    pub fn charged_price(&self) -> f64 {
        self.actual_price
            .or(self.base_price)
            .or(self.price)
            .unwrap_or(0.0)
    }

    pub fn line_discount(&self) -> f64 {
        let terms = DiscountTerms {
            discount_type: self.discount_type,
            discount: self.discount,
            discount_percentage: self.discount_percentage,
        };
        terms.amount_for(self.charged_price())
    }

    /// Never negative, however large the line discount.
    pub fn line_total(&self) -> f64 {
        (self.charged_price() - self.line_discount()).max(0.0)
    }

    /// Fills `base_price` and `actual_price` so stored lines are self-describing.
    pub fn normalize(&mut self) {
        let actual = self.charged_price();
        self.base_price = self.base_price.or(self.price).or(Some(actual));
        self.actual_price = Some(actual);
    }
}

fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceLine {
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "serialNumber")]
    pub serial_number: Option<String>,
    #[serde(default, alias = "unitPrice")]
    pub unit_price: f64,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

impl DeviceLine {
    pub fn line_total(&self) -> f64 {
        (self.unit_price * self.quantity as f64).max(0.0)
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

/// Financial input for one visit, as sent by the admin dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BillInput {
    #[serde(flatten)]
    pub fees: FeeSchedule,
    #[serde(default)]
    pub services: Vec<ServiceLine>,
    #[serde(default)]
    pub devices: Vec<DeviceLine>,
    #[serde(flatten)]
    pub discount: DiscountTerms,
    #[serde(default, alias = "taxPercentage")]
    pub tax_percentage: f64,
    #[serde(default, alias = "paymentMethod")]
    pub payment_method: Option<PaymentMethod>,
    /// `None` means the caller gave no payment instruction, which lets a
    /// wallet plan auto-pay the visit.
    #[serde(default, alias = "paidAmount")]
    pub paid_amount: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl BillInput {
    pub fn payment_request(&self) -> PaymentRequest {
        PaymentRequest {
            method: self.payment_method,
            paid_amount: self.paid_amount,
        }
    }

    pub fn validate(&self) -> Result<(), BillingError> {
        for (field, amount) in self.fees.named_amounts() {
            check_amount(field, amount)?;
        }
        check_discount(&self.discount)?;
        check_percentage("tax_percentage", self.tax_percentage)?;
        if let Some(paid) = self.paid_amount {
            check_amount("paid_amount", paid)?;
        }
        check_services(&self.services)?;
        check_devices(&self.devices)
    }
}

/// Partial correction of a stored bill. Only present fields are overwritten.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BillUpdate {
    #[serde(default, alias = "consultationFee")]
    pub consultation_fee: Option<f64>,
    #[serde(default, alias = "treatmentFee")]
    pub treatment_fee: Option<f64>,
    #[serde(default, alias = "medicineFee")]
    pub medicine_fee: Option<f64>,
    #[serde(default, alias = "otherCharges")]
    pub other_charges: Option<f64>,
    #[serde(default, alias = "hearingAidFee")]
    pub hearing_aid_fee: Option<f64>,
    #[serde(default, alias = "audiometryFee")]
    pub audiometry_fee: Option<f64>,
    #[serde(default)]
    pub services: Option<Vec<ServiceLine>>,
    #[serde(default)]
    pub devices: Option<Vec<DeviceLine>>,
    #[serde(default, alias = "discountType")]
    pub discount_type: Option<DiscountType>,
    #[serde(default)]
    pub discount: Option<f64>,
    #[serde(default, alias = "discountPercentage")]
    pub discount_percentage: Option<f64>,
    #[serde(default, alias = "taxPercentage")]
    pub tax_percentage: Option<f64>,
    #[serde(default, alias = "paymentMethod")]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default, alias = "paidAmount")]
    pub paid_amount: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl BillUpdate {
    pub fn validate(&self) -> Result<(), BillingError> {
        let amounts = [
            ("consultation_fee", self.consultation_fee),
            ("treatment_fee", self.treatment_fee),
            ("medicine_fee", self.medicine_fee),
            ("other_charges", self.other_charges),
            ("hearing_aid_fee", self.hearing_aid_fee),
            ("audiometry_fee", self.audiometry_fee),
            ("discount", self.discount),
            ("paid_amount", self.paid_amount),
        ];
        for (field, amount) in amounts {
            if let Some(amount) = amount {
                check_amount(field, amount)?;
            }
        }
        if let Some(pct) = self.discount_percentage {
            check_percentage("discount_percentage", pct)?;
        }
        if let Some(pct) = self.tax_percentage {
            check_percentage("tax_percentage", pct)?;
        }
        if let Some(services) = &self.services {
            check_services(services)?;
        }
        if let Some(devices) = &self.devices {
            check_devices(devices)?;
        }
        Ok(())
    }
}

// ==============================================================================
// BILL
// ==============================================================================

/// The computed financial record for one appointment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bill {
    pub id: Uuid,
    pub bill_number: String,
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub branch_id: Uuid,
    #[serde(flatten)]
    pub fees: FeeSchedule,
    pub services: Vec<ServiceLine>,
    pub devices: Vec<DeviceLine>,
    #[serde(flatten)]
    pub discount: DiscountTerms,
    pub discount_amount: f64,
    pub tax_percentage: f64,
    pub services_total: f64,
    pub devices_total: f64,
    pub subtotal: f64,
    pub tax: f64,
    pub total_amount: f64,
    pub paid_amount: f64,
    pub remaining_amount: f64,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    /// Amount actually taken from the patient's wallet for this visit.
    #[serde(default)]
    pub wallet_deduction: f64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bill {
    /// Re-derives every computed field from the stored inputs.
    /// A cancelled bill keeps its `cancelled` status.
    pub fn recalculate(&mut self) {
        self.services.iter_mut().for_each(ServiceLine::normalize);

        let totals = crate::services::calculator::compute_totals(
            &self.fees,
            &self.services,
            &self.devices,
            &self.discount,
            self.tax_percentage,
        );

        self.services_total = totals.services_total;
        self.devices_total = totals.devices_total;
        self.subtotal = totals.subtotal;
        self.discount_amount = totals.discount_amount;
        self.tax = totals.tax;
        self.total_amount = totals.total_amount;
        self.remaining_amount = self.total_amount - self.paid_amount;

        if self.payment_status != PaymentStatus::Cancelled {
            self.payment_status =
                crate::services::calculator::payment_status(self.total_amount, self.paid_amount);
        }
    }

    pub fn apply_update(&mut self, update: &BillUpdate, now: DateTime<Utc>) {
        let fee_fields = [
            (&mut self.fees.consultation_fee, update.consultation_fee),
            (&mut self.fees.treatment_fee, update.treatment_fee),
            (&mut self.fees.medicine_fee, update.medicine_fee),
            (&mut self.fees.other_charges, update.other_charges),
            (&mut self.fees.hearing_aid_fee, update.hearing_aid_fee),
            (&mut self.fees.audiometry_fee, update.audiometry_fee),
            (&mut self.discount.discount, update.discount),
            (&mut self.discount.discount_percentage, update.discount_percentage),
            (&mut self.tax_percentage, update.tax_percentage),
            (&mut self.paid_amount, update.paid_amount),
        ];
        for (field, value) in fee_fields {
            if let Some(value) = value {
                *field = value;
            }
        }

        if let Some(services) = &update.services {
            self.services = services.clone();
        }
        if let Some(devices) = &update.devices {
            self.devices = devices.clone();
        }
        if let Some(discount_type) = update.discount_type {
            self.discount.discount_type = discount_type;
        }
        if let Some(method) = update.payment_method {
            self.payment_method = method;
        }
        if let Some(notes) = &update.notes {
            self.notes = Some(notes.clone());
        }

        self.updated_at = now;
        self.recalculate();
    }

    /// Decides who pays against the wallet as it stands right now and
    /// re-derives the amounts. Wallet auto-pay only happens when `wallet`
    /// covers the visit at this moment.
    pub fn settle_payment(&mut self, request: &PaymentRequest, wallet: Option<&WalletTerms>) {
        let payment =
            crate::services::calculator::resolve_payment(request.method, request.paid_amount, wallet);
        self.payment_method = payment.method;
        self.paid_amount = payment.paid_amount;
        self.recalculate();
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) {
        self.payment_status = PaymentStatus::Cancelled;
        self.updated_at = now;
    }
}

/// Derived amounts of a bill.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct BillTotals {
    pub services_total: f64,
    pub devices_total: f64,
    pub subtotal: f64,
    pub discount_amount: f64,
    pub taxable_amount: f64,
    pub tax: f64,
    pub total_amount: f64,
}

/// Payment instruction as the caller sent it, before any wallet auto-pay.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct PaymentRequest {
    pub method: Option<PaymentMethod>,
    pub paid_amount: Option<f64>,
}

/// Wallet state relevant to paying for one visit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct WalletTerms {
    pub balance: f64,
    pub visit_charge: f64,
}

impl WalletTerms {
    pub fn covers_visit(&self) -> bool {
        self.balance >= self.visit_charge
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error, PartialEq)]
pub enum BillingError {
    #[error("{field} must be a non-negative amount, got {value}")]
    NegativeAmount { field: String, value: f64 },

    #[error("{field} must be between 0 and 100, got {value}")]
    InvalidPercentage { field: String, value: f64 },

    #[error("{field} must be a finite number")]
    NotFinite { field: String },
}

fn check_amount(field: &str, value: f64) -> Result<(), BillingError> {
    if !value.is_finite() {
        return Err(BillingError::NotFinite { field: field.to_string() });
    }
    if value < 0.0 {
        return Err(BillingError::NegativeAmount { field: field.to_string(), value });
    }
    Ok(())
}

fn check_percentage(field: &str, value: f64) -> Result<(), BillingError> {
    if !value.is_finite() {
        return Err(BillingError::NotFinite { field: field.to_string() });
    }
    if !(0.0..=100.0).contains(&value) {
        return Err(BillingError::InvalidPercentage { field: field.to_string(), value });
    }
    Ok(())
}

fn check_discount(terms: &DiscountTerms) -> Result<(), BillingError> {
    check_amount("discount", terms.discount)?;
    check_percentage("discount_percentage", terms.discount_percentage)
}

fn check_services(services: &[ServiceLine]) -> Result<(), BillingError> {
    for (idx, line) in services.iter().enumerate() {
        for (name, price) in [
            ("base_price", line.base_price),
            ("actual_price", line.actual_price),
            ("price", line.price),
        ] {
            if let Some(price) = price {
                check_amount(&format!("services[{}].{}", idx, name), price)?;
            }
        }
        check_amount(&format!("services[{}].discount", idx), line.discount)?;
        check_percentage(&format!("services[{}].discount_percentage", idx), line.discount_percentage)?;
    }
    Ok(())
}

fn check_devices(devices: &[DeviceLine]) -> Result<(), BillingError> {
    for (idx, device) in devices.iter().enumerate() {
        check_amount(&format!("devices[{}].unit_price", idx), device.unit_price)?;
    }
    Ok(())
}
