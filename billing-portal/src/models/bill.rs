//! Bill balance model.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

/// Aggregated payment status of a bill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    PartiallyPaid,
    FullyPaid,
}

impl PaymentStatus {
    /// Spelling stored in `payment_details.payment_status`.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "Unpaid",
            PaymentStatus::PartiallyPaid => "Partially Paid",
            PaymentStatus::FullyPaid => "Fully Paid",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "fully paid" => PaymentStatus::FullyPaid,
            "partially paid" => PaymentStatus::PartiallyPaid,
            _ => PaymentStatus::Unpaid,
        }
    }

    /// Spelling printed on receipts.
    pub fn receipt_label(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "UNPAID",
            PaymentStatus::PartiallyPaid => "PARTIALLY PAID",
            PaymentStatus::FullyPaid => "FULLY PAID",
        }
    }

    /// Settled bills accept neither payments nor adjustments.
    pub fn is_settled(&self) -> bool {
        matches!(self, PaymentStatus::FullyPaid)
    }

    /// Status implied by what is left owing after a posting.
    pub fn after_posting(remaining: Decimal) -> Self {
        if remaining <= Decimal::ZERO {
            PaymentStatus::FullyPaid
        } else {
            PaymentStatus::PartiallyPaid
        }
    }
}

/// Bill thresholds joined with the sum of its payments.
#[derive(Debug, Clone, FromRow)]
pub struct BillBalance {
    pub total_paid: Decimal,
    pub total_amount_before_due_date: Decimal,
    pub total_amount_after_due_date: Decimal,
    pub due_date: NaiveDateTime,
    pub payment_status: Option<String>,
}

impl BillBalance {
    /// Bills without payment rows count as unpaid.
    pub fn status(&self) -> PaymentStatus {
        self.payment_status
            .as_deref()
            .map(PaymentStatus::from_string)
            .unwrap_or(PaymentStatus::Unpaid)
    }

    /// Bill total applicable at `at`; the due date itself still counts as
    /// on time.
    pub fn amount_due_at(&self, at: NaiveDateTime) -> Decimal {
        if at <= self.due_date {
            self.total_amount_before_due_date
        } else {
            self.total_amount_after_due_date
        }
    }

    pub fn outstanding_at(&self, at: NaiveDateTime) -> Decimal {
        self.amount_due_at(at) - self.total_paid
    }
}
