use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::{require_role, FRONT_DESK_ROLES};

use crate::models::{BillInput, BillingError, WalletTerms};
use crate::services::calculator::{payment_status, resolve_payment, BillCalculator};

impl From<BillingError> for AppError {
    fn from(err: BillingError) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillPreviewRequest {
    pub bill: BillInput,
    /// Patient wallet state; a positive visit charge prices the consultation.
    #[serde(default)]
    pub wallet: Option<WalletTerms>,
}

#[axum::debug_handler]
pub async fn preview_bill(
    State(_config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<BillPreviewRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, FRONT_DESK_ROLES)?;
    request.bill.validate()?;

    let consultation_fee = match &request.wallet {
        Some(terms) if terms.visit_charge > 0.0 => terms.visit_charge,
        _ => request.bill.fees.consultation_fee,
    };
    let wallet = request.wallet.map(|terms| WalletTerms { visit_charge: consultation_fee, ..terms });

    let totals = BillCalculator::preview(&request.bill, consultation_fee);
    let payment = resolve_payment(
        request.bill.payment_method,
        request.bill.paid_amount,
        wallet.as_ref(),
    );

    Ok(Json(json!({
        "success": true,
        "consultation_fee": consultation_fee,
        "totals": totals,
        "payment_method": payment.method,
        "paid_amount": payment.paid_amount,
        "remaining_amount": totals.total_amount - payment.paid_amount,
        "payment_status": payment_status(totals.total_amount, payment.paid_amount),
    })))
}
