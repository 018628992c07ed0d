//! Bill payment models.

use super::{positive_amount, PaymentStatus, RECEIPT_TIMESTAMP_FORMAT};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Submitted bill payment form.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PaymentForm {
    pub bill_id: i64,
    #[validate(custom(function = "positive_amount"))]
    pub amount: Decimal,
    pub payment_method_id: i64,
}

/// Arguments of the payment-posting stored function.
#[derive(Debug, Clone)]
pub struct PaymentPosting {
    pub bill_id: i64,
    pub payment_date: NaiveDateTime,
    pub payment_method_id: i64,
    pub amount: Decimal,
}

/// What the receipt page shows after a successful payment.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentReceipt {
    pub bill_id: i64,
    pub amount: Decimal,
    pub payment_method_id: i64,
    pub payment_method_description: String,
    pub payment_date: NaiveDateTime,
    /// Derived from the pre-posting balance, not re-read after commit.
    pub payment_status: PaymentStatus,
    pub outstanding_amount: Decimal,
}

impl PaymentReceipt {
    pub fn payment_date_label(&self) -> String {
        self.payment_date.format(RECEIPT_TIMESTAMP_FORMAT).to_string()
    }

    pub fn status_label(&self) -> &'static str {
        self.payment_status.receipt_label()
    }
}
