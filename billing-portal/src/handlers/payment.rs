use crate::error::BillingError;
use crate::models::{PaymentForm, PaymentReceipt};
use crate::startup::AppState;
use askama::Template;
use axum::{extract::State, Form};

#[derive(Template)]
#[template(path = "payment_receipt.html")]
pub struct PaymentReceiptTemplate {
    pub receipt: PaymentReceipt,
}

pub async fn submit_payment(
    State(state): State<AppState>,
    Form(form): Form<PaymentForm>,
) -> Result<PaymentReceiptTemplate, BillingError> {
    let receipt = state.payments.submit(&form).await?;
    Ok(PaymentReceiptTemplate { receipt })
}
