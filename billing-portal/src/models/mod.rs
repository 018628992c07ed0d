//! Domain models for billing-portal.

mod adjustment;
mod bill;
mod payment;
mod statement;

pub use adjustment::{AdjustmentForm, AdjustmentPosting, AdjustmentReceipt};
pub use bill::{BillBalance, PaymentStatus};
pub use payment::{PaymentForm, PaymentPosting, PaymentReceipt};
pub use statement::{
    BillStatement, ComputedCharges, FixedCharge, PreviousBill, StatementHeader,
    StatementQuery, SubsidyLine, SubsidyRate, TariffLine, TariffRate, TaxLine, TaxRate,
};

use rust_decimal::{Decimal, RoundingStrategy};

/// Timestamp layout used on receipts.
pub const RECEIPT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Round a monetary value to cents, halves away from zero.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Field validator shared by the payment and adjustment forms.
pub(crate) fn positive_amount(value: &Decimal) -> Result<(), validator::ValidationError> {
    if value.is_sign_positive() && !value.is_zero() {
        Ok(())
    } else {
        let mut err = validator::ValidationError::new("positive_amount");
        err.message = Some("Amount must be greater than zero".into());
        Err(err)
    }
}
