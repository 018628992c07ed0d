//! Bill adjustment models.

use super::{positive_amount, RECEIPT_TIMESTAMP_FORMAT};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Submitted bill adjustment form.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AdjustmentForm {
    pub bill_id: i64,
    #[validate(length(min = 1, max = 100, message = "Officer name must be 1-100 characters"))]
    pub officer_name: String,
    #[validate(length(min = 1, max = 100, message = "Officer designation must be 1-100 characters"))]
    pub officer_designation: String,
    #[validate(custom(function = "positive_amount"))]
    pub original_bill_amount: Decimal,
    #[validate(custom(function = "positive_amount"))]
    pub adjustment_amount: Decimal,
    #[validate(length(min = 1, max = 500, message = "Adjustment reason must be 1-500 characters"))]
    pub adjustment_reason: String,
}

/// Arguments of the adjustment-posting stored function.
#[derive(Debug, Clone)]
pub struct AdjustmentPosting {
    pub adjustment_id: i64,
    pub bill_id: i64,
    pub adjustment_date: NaiveDateTime,
    pub officer_name: String,
    pub officer_designation: String,
    pub original_bill_amount: Decimal,
    pub adjustment_amount: Decimal,
    pub adjustment_reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdjustmentReceipt {
    pub adjustment_id: i64,
    pub bill_id: i64,
    pub officer_name: String,
    pub officer_designation: String,
    pub original_bill_amount: Decimal,
    pub adjustment_amount: Decimal,
    pub adjustment_reason: String,
    pub adjustment_date: NaiveDateTime,
}

impl AdjustmentReceipt {
    pub fn adjustment_date_label(&self) -> String {
        self.adjustment_date
            .format(RECEIPT_TIMESTAMP_FORMAT)
            .to_string()
    }
}
