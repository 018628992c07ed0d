//! Bill adjustment workflow.

use crate::error::BillingError;
use crate::models::{AdjustmentForm, AdjustmentPosting, AdjustmentReceipt};
use crate::services::gateway::{BillingGateway, BillingTransaction, POSTING_REJECTED};
use crate::services::metrics;
use crate::utils::Clock;
use chrono::NaiveDateTime;
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use validator::Validate;

const ADJUSTMENT_FAILED: &str = "Failed to process bill adjustment";

/// Attempts at drawing an unused adjustment id before giving up.
pub const ADJUSTMENT_ID_ATTEMPTS: usize = 5;

fn adjustment_failed(err: AppError) -> BillingError {
    error!(error = %err, "Adjustment infrastructure failure");
    BillingError::PostingFailed(ADJUSTMENT_FAILED)
}

/// A random six-digit id.
pub fn random_adjustment_id() -> i64 {
    rand::thread_rng().gen_range(100_000..=999_999)
}

#[derive(Clone)]
pub struct AdjustmentWorkflow {
    gateway: Arc<dyn BillingGateway>,
    clock: Arc<dyn Clock>,
}

impl AdjustmentWorkflow {
    pub fn new(gateway: Arc<dyn BillingGateway>, clock: Arc<dyn Clock>) -> Self {
        Self { gateway, clock }
    }

    #[instrument(skip(self, form), fields(bill_id = form.bill_id))]
    pub async fn submit(&self, form: &AdjustmentForm) -> Result<AdjustmentReceipt, BillingError> {
        let result = self.run(form).await;

        match &result {
            Ok(receipt) => {
                metrics::record_adjustment("success");
                metrics::record_posted_amount(
                    "adjustment",
                    receipt.adjustment_amount.to_f64().unwrap_or(0.0),
                );
                info!(
                    adjustment_id = receipt.adjustment_id,
                    amount = %receipt.adjustment_amount,
                    officer = %receipt.officer_name,
                    "Adjustment posted"
                );
            }
            Err(e) => {
                metrics::record_adjustment(e.kind());
                warn!(reason = e.kind(), error = %e, "Adjustment not posted");
            }
        }

        result
    }

    async fn run(&self, form: &AdjustmentForm) -> Result<AdjustmentReceipt, BillingError> {
        form.validate()?;
        let now = self.clock.now();

        let mut tx = self.gateway.begin().await.map_err(adjustment_failed)?;
        match post(tx.as_mut(), form, now).await {
            Ok(receipt) => {
                tx.commit().await.map_err(adjustment_failed)?;
                Ok(receipt)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    error!(error = %rollback_err, "Failed to roll back adjustment");
                }
                Err(e)
            }
        }
    }
}

async fn unused_adjustment_id(tx: &mut dyn BillingTransaction) -> Result<i64, BillingError> {
    for _ in 0..ADJUSTMENT_ID_ATTEMPTS {
        let candidate = random_adjustment_id();
        if !tx
            .adjustment_id_exists(candidate)
            .await
            .map_err(adjustment_failed)?
        {
            return Ok(candidate);
        }
        warn!(adjustment_id = candidate, "Adjustment id already taken");
    }
    error!(
        attempts = ADJUSTMENT_ID_ATTEMPTS,
        "No unused adjustment id found"
    );
    Err(BillingError::PostingFailed(ADJUSTMENT_FAILED))
}

async fn post(
    tx: &mut dyn BillingTransaction,
    form: &AdjustmentForm,
    now: NaiveDateTime,
) -> Result<AdjustmentReceipt, BillingError> {
    tx.lock_bill(form.bill_id).await.map_err(adjustment_failed)?;

    let balance = tx
        .bill_balance(form.bill_id)
        .await
        .map_err(adjustment_failed)?
        .ok_or(BillingError::InvalidReference("Invalid Bill ID"))?;

    if balance.status().is_settled() || balance.outstanding_at(now) <= Decimal::ZERO {
        return Err(BillingError::AlreadySettled(
            "The bill is already fully paid. Adjustment not allowed.",
        ));
    }

    if form.adjustment_amount > form.original_bill_amount {
        return Err(BillingError::ExcessiveAdjustment {
            adjustment: form.adjustment_amount,
            original: form.original_bill_amount,
        });
    }

    let posting = AdjustmentPosting {
        adjustment_id: unused_adjustment_id(tx).await?,
        bill_id: form.bill_id,
        adjustment_date: now,
        officer_name: form.officer_name.clone(),
        officer_designation: form.officer_designation.clone(),
        original_bill_amount: form.original_bill_amount,
        adjustment_amount: form.adjustment_amount,
        adjustment_reason: form.adjustment_reason.clone(),
    };

    let result = tx.adjust_bill(&posting).await.map_err(adjustment_failed)?;
    if result == POSTING_REJECTED {
        return Err(BillingError::PostingRejected(
            "Adjustment failed. Please check your inputs.",
        ));
    }

    Ok(AdjustmentReceipt {
        adjustment_id: posting.adjustment_id,
        bill_id: posting.bill_id,
        officer_name: posting.officer_name,
        officer_designation: posting.officer_designation,
        original_bill_amount: posting.original_bill_amount,
        adjustment_amount: posting.adjustment_amount,
        adjustment_reason: posting.adjustment_reason,
        adjustment_date: now,
    })
}
