//! Bill payment workflow.

use crate::error::BillingError;
use crate::models::{round_money, PaymentForm, PaymentPosting, PaymentReceipt, PaymentStatus};
use crate::services::gateway::{BillingGateway, BillingTransaction, POSTING_REJECTED};
use crate::services::metrics;
use crate::utils::Clock;
use chrono::NaiveDateTime;
use rust_decimal::prelude::ToPrimitive;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use validator::Validate;

const PAYMENT_FAILED: &str = "Failed to process payment";

fn payment_failed(err: AppError) -> BillingError {
    error!(error = %err, "Payment infrastructure failure");
    BillingError::PostingFailed(PAYMENT_FAILED)
}

#[derive(Clone)]
pub struct PaymentWorkflow {
    gateway: Arc<dyn BillingGateway>,
    clock: Arc<dyn Clock>,
}

impl PaymentWorkflow {
    pub fn new(gateway: Arc<dyn BillingGateway>, clock: Arc<dyn Clock>) -> Self {
        Self { gateway, clock }
    }

    /// Validate and post one payment. The posting is committed only when
    /// the database accepted it; every other outcome rolls back.
    #[instrument(skip(self, form), fields(bill_id = form.bill_id, payment_method_id = form.payment_method_id))]
    pub async fn submit(&self, form: &PaymentForm) -> Result<PaymentReceipt, BillingError> {
        let result = self.run(form).await;

        match &result {
            Ok(receipt) => {
                metrics::record_payment("success");
                metrics::record_posted_amount("payment", receipt.amount.to_f64().unwrap_or(0.0));
                info!(
                    amount = %receipt.amount,
                    status = receipt.status_label(),
                    "Payment posted"
                );
            }
            Err(e) => {
                metrics::record_payment(e.kind());
                warn!(reason = e.kind(), error = %e, "Payment not posted");
            }
        }

        result
    }

    async fn run(&self, form: &PaymentForm) -> Result<PaymentReceipt, BillingError> {
        form.validate()?;
        let now = self.clock.now();

        let mut tx = self.gateway.begin().await.map_err(payment_failed)?;
        match post(tx.as_mut(), form, now).await {
            Ok(receipt) => {
                tx.commit().await.map_err(payment_failed)?;
                Ok(receipt)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    error!(error = %rollback_err, "Failed to roll back payment");
                }
                Err(e)
            }
        }
    }
}

async fn post(
    tx: &mut dyn BillingTransaction,
    form: &PaymentForm,
    now: NaiveDateTime,
) -> Result<PaymentReceipt, BillingError> {
    tx.lock_bill(form.bill_id).await.map_err(payment_failed)?;

    let method_description = tx
        .payment_method_description(form.payment_method_id)
        .await
        .map_err(payment_failed)?
        .ok_or(BillingError::InvalidReference("Invalid Payment Method ID"))?;

    let balance = tx
        .bill_balance(form.bill_id)
        .await
        .map_err(payment_failed)?
        .ok_or(BillingError::InvalidReference("Invalid Bill ID"))?;

    if balance.status().is_settled() {
        return Err(BillingError::AlreadySettled("The bill is already fully paid."));
    }

    let outstanding = balance.outstanding_at(now);
    if outstanding <= rust_decimal::Decimal::ZERO {
        return Err(BillingError::NothingOwed);
    }
    if form.amount > outstanding {
        return Err(BillingError::Overpayment {
            amount: form.amount,
            outstanding: round_money(outstanding),
        });
    }

    let posting = PaymentPosting {
        bill_id: form.bill_id,
        payment_date: now,
        payment_method_id: form.payment_method_id,
        amount: form.amount,
    };
    let result = tx.process_payment(&posting).await.map_err(payment_failed)?;
    if result == POSTING_REJECTED {
        return Err(BillingError::PostingRejected(
            "Payment processing failed. Please check your inputs.",
        ));
    }

    let remaining = outstanding - form.amount;
    Ok(PaymentReceipt {
        bill_id: form.bill_id,
        amount: form.amount,
        payment_method_id: form.payment_method_id,
        payment_method_description: method_description,
        payment_date: now,
        payment_status: PaymentStatus::after_posting(remaining),
        outstanding_amount: round_money(remaining),
    })
}
