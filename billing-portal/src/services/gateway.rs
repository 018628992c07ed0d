//! The database seam.
//!
//! All computational truth lives in the database: the portal reads rows,
//! calls stored functions and decides nothing the database could decide
//! for it. Workflows depend on these traits so they can run against
//! PostgreSQL in production and an in-memory double in tests.

use crate::models::{
    AdjustmentPosting, BillBalance, ComputedCharges, FixedCharge, PaymentPosting, PreviousBill,
    StatementHeader, StatementQuery, SubsidyRate, TariffRate, TaxRate,
};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use service_core::error::AppError;

/// Value the posting functions return when they refuse a posting.
pub const POSTING_REJECTED: i32 = -1;

#[async_trait]
pub trait BillingGateway: Send + Sync {
    /// Start a unit of work for a mutating workflow.
    async fn begin(&self) -> Result<Box<dyn BillingTransaction>, AppError>;

    async fn health_check(&self) -> Result<(), AppError>;

    /// `total_amount_before_due_date` of a bill.
    async fn original_bill_amount(&self, bill_id: i64) -> Result<Option<Decimal>, AppError>;

    async fn statement_header(
        &self,
        query: &StatementQuery,
    ) -> Result<Option<StatementHeader>, AppError>;

    /// Up to ten bills of the connection before the queried month, newest first.
    async fn previous_bills(&self, query: &StatementQuery) -> Result<Vec<PreviousBill>, AppError>;

    async fn computed_charges(
        &self,
        query: &StatementQuery,
        bill_issue_date: NaiveDateTime,
    ) -> Result<ComputedCharges, AppError>;

    async fn subsidy_rates(
        &self,
        connection_id: &str,
        bill_issue_date: NaiveDateTime,
    ) -> Result<Vec<SubsidyRate>, AppError>;

    async fn tariff_rates(
        &self,
        connection_id: &str,
        bill_issue_date: NaiveDateTime,
    ) -> Result<Vec<TariffRate>, AppError>;

    async fn tax_rates(&self, query: &StatementQuery) -> Result<Vec<TaxRate>, AppError>;

    async fn fixed_charges(
        &self,
        connection_id: &str,
        bill_issue_date: NaiveDateTime,
    ) -> Result<Vec<FixedCharge>, AppError>;
}

/// One database transaction. Nothing is visible to other sessions until
/// [`BillingTransaction::commit`]; dropping without commit discards the work.
#[async_trait]
pub trait BillingTransaction: Send {
    /// Serialize workflows touching the same bill until this transaction ends.
    async fn lock_bill(&mut self, bill_id: i64) -> Result<(), AppError>;

    async fn payment_method_description(
        &mut self,
        payment_method_id: i64,
    ) -> Result<Option<String>, AppError>;

    async fn bill_balance(&mut self, bill_id: i64) -> Result<Option<BillBalance>, AppError>;

    /// Calls `fun_process_payment`; returns its raw result.
    async fn process_payment(&mut self, posting: &PaymentPosting) -> Result<i32, AppError>;

    async fn adjustment_id_exists(&mut self, adjustment_id: i64) -> Result<bool, AppError>;

    /// Calls `fun_adjust_bill`; returns its raw result.
    async fn adjust_bill(&mut self, posting: &AdjustmentPosting) -> Result<i32, AppError>;

    async fn commit(&mut self) -> Result<(), AppError>;

    /// A no-op once the transaction has been committed.
    async fn rollback(&mut self) -> Result<(), AppError>;
}
