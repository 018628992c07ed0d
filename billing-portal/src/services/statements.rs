//! Read-only bill statement assembly.

use crate::error::BillingError;
use crate::models::{round_money, BillStatement, StatementQuery};
use crate::services::gateway::BillingGateway;
use crate::services::metrics;
use crate::services::tariffs::{match_subsidies, match_tariffs, tax_lines};
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use validator::Validate;

const NO_BILL_FOUND: &str = "No bill found for the given inputs";

fn aggregation_failed(err: AppError) -> BillingError {
    error!(error = %err, "Bill aggregation failure");
    BillingError::AggregationFailed
}

#[derive(Clone)]
pub struct StatementService {
    gateway: Arc<dyn BillingGateway>,
}

impl StatementService {
    pub fn new(gateway: Arc<dyn BillingGateway>) -> Self {
        Self { gateway }
    }

    #[instrument(skip(self, query), fields(connection_id = %query.connection_id, month = query.month, year = query.year))]
    pub async fn retrieve(&self, query: &StatementQuery) -> Result<BillStatement, BillingError> {
        let result = self.assemble(query).await;

        match &result {
            Ok(statement) => {
                metrics::record_retrieval("success");
                info!(
                    tariffs = statement.tariffs.len(),
                    subsidies = statement.subsidies.len(),
                    previous_bills = statement.previous_bills.len(),
                    "Bill statement assembled"
                );
            }
            Err(e) => {
                metrics::record_retrieval(e.kind());
                warn!(reason = e.kind(), "Bill statement not assembled");
            }
        }

        result
    }

    async fn assemble(&self, query: &StatementQuery) -> Result<BillStatement, BillingError> {
        // A period that cannot exist is reported like one with no bill.
        if let Err(e) = query.validate() {
            debug!(error = %BillingError::from(e), "Statement query rejected");
            return Err(BillingError::NotFound(NO_BILL_FOUND));
        }

        let header = self
            .gateway
            .statement_header(query)
            .await
            .map_err(aggregation_failed)?
            .ok_or(BillingError::NotFound(NO_BILL_FOUND))?;

        let previous_bills = self
            .gateway
            .previous_bills(query)
            .await
            .map_err(aggregation_failed)?;

        let charges = self
            .gateway
            .computed_charges(query, header.bill_issue_date)
            .await
            .map_err(aggregation_failed)?;
        if charges.billing_days <= 0 {
            error!(
                billing_days = charges.billing_days,
                "Non-positive billing period"
            );
            return Err(BillingError::AggregationFailed);
        }

        let subsidy_rates = self
            .gateway
            .subsidy_rates(&header.connection_id, header.bill_issue_date)
            .await
            .map_err(aggregation_failed)?;
        let tariff_rates = self
            .gateway
            .tariff_rates(&header.connection_id, header.bill_issue_date)
            .await
            .map_err(aggregation_failed)?;
        let tax_rates = self
            .gateway
            .tax_rates(query)
            .await
            .map_err(aggregation_failed)?;
        let fixed_charges = self
            .gateway
            .fixed_charges(&header.connection_id, header.bill_issue_date)
            .await
            .map_err(aggregation_failed)?;

        Ok(BillStatement {
            subsidies: match_subsidies(&subsidy_rates, &charges),
            tariffs: match_tariffs(&tariff_rates, &charges),
            taxes: tax_lines(&tax_rates, &charges),
            fixed_charges,
            previous_bills,
            charges,
            header,
        })
    }

    /// Amount owed before the due date, rounded to cents.
    #[instrument(skip(self))]
    pub async fn original_bill_amount(&self, bill_id: i64) -> Result<Decimal, BillingError> {
        self.gateway
            .original_bill_amount(bill_id)
            .await
            .map_err(|e| {
                error!(error = %e, "Original amount lookup failure");
                BillingError::LookupFailed("Failed to fetch original bill amount")
            })?
            .map(round_money)
            .ok_or(BillingError::NotFound("Invalid Bill ID"))
    }
}
