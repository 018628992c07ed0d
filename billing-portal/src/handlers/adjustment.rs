use crate::error::BillingError;
use crate::models::{AdjustmentForm, AdjustmentReceipt};
use crate::startup::AppState;
use askama::Template;
use axum::{
    extract::{Path, State},
    Form, Json,
};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Template)]
#[template(path = "adjustment_receipt.html")]
pub struct AdjustmentReceiptTemplate {
    pub receipt: AdjustmentReceipt,
}

/// Body of `GET /get-original-bill-amount/{bill_id}`. The amount is a
/// JSON number.
#[derive(Debug, Serialize)]
pub struct OriginalBillAmount {
    #[serde(with = "rust_decimal::serde::float")]
    pub original_bill_amount: Decimal,
}

pub async fn submit_adjustment(
    State(state): State<AppState>,
    Form(form): Form<AdjustmentForm>,
) -> Result<AdjustmentReceiptTemplate, BillingError> {
    let receipt = state.adjustments.submit(&form).await?;
    Ok(AdjustmentReceiptTemplate { receipt })
}

pub async fn original_bill_amount(
    State(state): State<AppState>,
    Path(bill_id): Path<i64>,
) -> Result<Json<OriginalBillAmount>, BillingError> {
    let original_bill_amount = state.statements.original_bill_amount(bill_id).await?;
    Ok(Json(OriginalBillAmount {
        original_bill_amount,
    }))
}
