//! Test helper module for billing-portal integration tests.
//!
//! Provides an in-memory billing gateway that records every transaction
//! outcome, plus router helpers for driving the HTTP surface.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use billing_portal::models::{
    AdjustmentPosting, BillBalance, ComputedCharges, FixedCharge, PaymentPosting, PreviousBill,
    StatementHeader, StatementQuery, SubsidyRate, TariffRate, TaxRate,
};
use billing_portal::services::{BillingGateway, BillingTransaction};
use billing_portal::startup::{build_router, AppState};
use billing_portal::utils::FixedClock;
use chrono::{NaiveDate, NaiveDateTime};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const BILL_ID: i64 = 7;
pub const PAYMENT_METHOD_ID: i64 = 2;

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, s)
        .unwrap()
}

/// Due date of the sample bill.
pub fn due_date() -> NaiveDateTime {
    at(2024, 1, 10, 0, 0, 0)
}

pub fn before_due() -> NaiveDateTime {
    at(2024, 1, 5, 9, 30, 0)
}

pub fn after_due() -> NaiveDateTime {
    at(2024, 1, 15, 9, 30, 0)
}

/// Unpaid bill: 100.00 before the due date, 110.00 after.
pub fn unpaid_bill() -> BillBalance {
    BillBalance {
        total_paid: dec!(0),
        total_amount_before_due_date: dec!(100.00),
        total_amount_after_due_date: dec!(110.00),
        due_date: due_date(),
        payment_status: None,
    }
}

/// Canned data for one bill statement.
#[derive(Clone)]
pub struct StatementFixture {
    pub header: StatementHeader,
    pub previous_bills: Vec<PreviousBill>,
    pub charges: ComputedCharges,
    pub subsidy_rates: Vec<SubsidyRate>,
    pub tariff_rates: Vec<TariffRate>,
    pub tax_rates: Vec<TaxRate>,
    pub fixed_charges: Vec<FixedCharge>,
}

pub fn sample_statement() -> StatementFixture {
    StatementFixture {
        header: StatementHeader {
            customer_id: "C-1001".to_string(),
            first_name: "Ayesha".to_string(),
            last_name: "Khan".to_string(),
            customer_address: Some("12 Canal Road".to_string()),
            customer_phone: None,
            customer_email: Some("ayesha@example.com".to_string()),
            connection_id: "CN-55".to_string(),
            connection_type: "Residential".to_string(),
            division_name: "North".to_string(),
            sub_div_name: "North-2".to_string(),
            installation_date: NaiveDate::from_ymd_opt(2019, 3, 14).unwrap(),
            meter_type: "Net Meter".to_string(),
            bill_issue_date: at(2024, 1, 1, 0, 0, 0),
            net_peak_units: 480,
            net_off_peak_units: 200,
            total_amount_before_due_date: dec!(100.00),
            due_date: due_date(),
            total_amount_after_due_date: dec!(110.00),
            billing_month: 1,
            billing_year: 2024,
        },
        previous_bills: vec![PreviousBill {
            billing_month: 12,
            billing_year: 2023,
            total_amount_before_due_date: dec!(95.50),
            due_date: at(2023, 12, 10, 0, 0, 0),
            payment_status: Some("Fully Paid".to_string()),
        }],
        charges: ComputedCharges {
            billing_days: 30,
            import_peak_units: 480,
            import_off_peak_units: 240,
            export_off_peak_units: 40,
            peak_amount: dec!(60.00),
            off_peak_amount: dec!(20.00),
            tax_amount: dec!(8.00),
            fixed_fee: dec!(5.00),
            subsidy_amount: dec!(0),
            arrears: dec!(0),
        },
        subsidy_rates: vec![SubsidyRate {
            subsidy_name: "Heavy Users".to_string(),
            provider_name: "State Energy Fund".to_string(),
            rate_per_unit: dec!(0.5),
            threshold_low: dec!(5),
            threshold_high: dec!(10),
        }],
        tariff_rates: vec![TariffRate {
            tariff_code: "R-PEAK".to_string(),
            rate_per_unit: dec!(0.10),
            min_amount: dec!(15),
            min_unit: dec!(100),
            threshold_low: dec!(0),
            threshold_high: dec!(2),
            tariff_description: "Residential Peak".to_string(),
            tariff_type: 1,
        }],
        tax_rates: vec![
            TaxRate {
                tax_name: "Sales Tax".to_string(),
                tax_rate: dec!(0.05),
            },
            TaxRate {
                tax_name: "Electricity Duty".to_string(),
                tax_rate: dec!(0.05),
            },
            TaxRate {
                tax_name: "Television Fee".to_string(),
                tax_rate: dec!(0.01),
            },
        ],
        fixed_charges: vec![FixedCharge {
            charge_name: "Meter Rent".to_string(),
            amount: dec!(5.00),
        }],
    }
}

pub fn sample_query() -> StatementQuery {
    StatementQuery {
        customer_id: "C-1001".to_string(),
        connection_id: "CN-55".to_string(),
        month: 1,
        year: 2024,
    }
}

/// Everything the in-memory database holds and everything it observed.
pub struct Ledger {
    pub payment_methods: HashMap<i64, String>,
    pub bills: HashMap<i64, BillBalance>,
    pub statement: Option<StatementFixture>,
    pub process_payment_result: i32,
    pub adjust_bill_result: i32,
    /// Every adjustment id lookup reports a collision.
    pub adjustment_ids_exhausted: bool,
    pub healthy: bool,
    /// Reads and postings fail with a database error.
    pub failing: bool,

    pub begins: usize,
    pub commits: usize,
    pub rollbacks: usize,
    pub locked_bills: Vec<i64>,
    pub adjustment_id_checks: usize,
    pub committed_payments: Vec<PaymentPosting>,
    pub committed_adjustments: Vec<AdjustmentPosting>,
}

impl Default for Ledger {
    fn default() -> Self {
        let mut payment_methods = HashMap::new();
        payment_methods.insert(PAYMENT_METHOD_ID, "Credit Card".to_string());

        let mut bills = HashMap::new();
        bills.insert(BILL_ID, unpaid_bill());

        Self {
            payment_methods,
            bills,
            statement: Some(sample_statement()),
            process_payment_result: 1,
            adjust_bill_result: 1,
            adjustment_ids_exhausted: false,
            healthy: true,
            failing: false,
            begins: 0,
            commits: 0,
            rollbacks: 0,
            locked_bills: Vec::new(),
            adjustment_id_checks: 0,
            committed_payments: Vec::new(),
            committed_adjustments: Vec::new(),
        }
    }
}

fn database_down() -> AppError {
    AppError::DatabaseError(anyhow::anyhow!("connection refused"))
}

#[derive(Clone, Default)]
pub struct InMemoryGateway {
    pub ledger: Arc<Mutex<Ledger>>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adjust the canned data before a test runs.
    pub fn with(self, f: impl FnOnce(&mut Ledger)) -> Self {
        f(&mut self.ledger.lock().unwrap());
        self
    }

    pub fn ledger(&self) -> std::sync::MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap()
    }

    fn check(&self) -> Result<(), AppError> {
        if self.ledger().failing {
            Err(database_down())
        } else {
            Ok(())
        }
    }

    fn statement_for(&self, query: &StatementQuery) -> Option<StatementFixture> {
        self.ledger().statement.clone().filter(|s| {
            s.header.customer_id == query.customer_id
                && s.header.connection_id == query.connection_id
                && s.header.billing_month == query.month
                && s.header.billing_year == query.year
        })
    }

    fn statement(&self) -> Result<StatementFixture, AppError> {
        self.check()?;
        self.ledger()
            .statement
            .clone()
            .ok_or_else(|| AppError::DatabaseError(anyhow::anyhow!("no statement fixture")))
    }
}

#[async_trait]
impl BillingGateway for InMemoryGateway {
    async fn begin(&self) -> Result<Box<dyn BillingTransaction>, AppError> {
        self.ledger().begins += 1;
        Ok(Box::new(InMemoryTransaction {
            ledger: self.ledger.clone(),
            staged_payments: Vec::new(),
            staged_adjustments: Vec::new(),
            finished: false,
        }))
    }

    async fn health_check(&self) -> Result<(), AppError> {
        if self.ledger().healthy {
            Ok(())
        } else {
            Err(database_down())
        }
    }

    async fn original_bill_amount(&self, bill_id: i64) -> Result<Option<Decimal>, AppError> {
        self.check()?;
        Ok(self
            .ledger()
            .bills
            .get(&bill_id)
            .map(|b| b.total_amount_before_due_date))
    }

    async fn statement_header(
        &self,
        query: &StatementQuery,
    ) -> Result<Option<StatementHeader>, AppError> {
        self.check()?;
        Ok(self.statement_for(query).map(|s| s.header))
    }

    async fn previous_bills(&self, _query: &StatementQuery) -> Result<Vec<PreviousBill>, AppError> {
        Ok(self.statement()?.previous_bills)
    }

    async fn computed_charges(
        &self,
        _query: &StatementQuery,
        _bill_issue_date: NaiveDateTime,
    ) -> Result<ComputedCharges, AppError> {
        Ok(self.statement()?.charges)
    }

    async fn subsidy_rates(
        &self,
        _connection_id: &str,
        _bill_issue_date: NaiveDateTime,
    ) -> Result<Vec<SubsidyRate>, AppError> {
        Ok(self.statement()?.subsidy_rates)
    }

    async fn tariff_rates(
        &self,
        _connection_id: &str,
        _bill_issue_date: NaiveDateTime,
    ) -> Result<Vec<TariffRate>, AppError> {
        Ok(self.statement()?.tariff_rates)
    }

    async fn tax_rates(&self, _query: &StatementQuery) -> Result<Vec<TaxRate>, AppError> {
        Ok(self.statement()?.tax_rates)
    }

    async fn fixed_charges(
        &self,
        _connection_id: &str,
        _bill_issue_date: NaiveDateTime,
    ) -> Result<Vec<FixedCharge>, AppError> {
        Ok(self.statement()?.fixed_charges)
    }
}

/// Postings are staged until commit; rollback discards them.
pub struct InMemoryTransaction {
    ledger: Arc<Mutex<Ledger>>,
    staged_payments: Vec<PaymentPosting>,
    staged_adjustments: Vec<AdjustmentPosting>,
    finished: bool,
}

impl InMemoryTransaction {
    fn ledger(&self) -> std::sync::MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap()
    }

    fn check(&self) -> Result<(), AppError> {
        if self.ledger().failing {
            Err(database_down())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BillingTransaction for InMemoryTransaction {
    async fn lock_bill(&mut self, bill_id: i64) -> Result<(), AppError> {
        self.ledger().locked_bills.push(bill_id);
        Ok(())
    }

    async fn payment_method_description(
        &mut self,
        payment_method_id: i64,
    ) -> Result<Option<String>, AppError> {
        self.check()?;
        Ok(self.ledger().payment_methods.get(&payment_method_id).cloned())
    }

    async fn bill_balance(&mut self, bill_id: i64) -> Result<Option<BillBalance>, AppError> {
        self.check()?;
        Ok(self.ledger().bills.get(&bill_id).cloned())
    }

    async fn process_payment(&mut self, posting: &PaymentPosting) -> Result<i32, AppError> {
        self.check()?;
        let result = self.ledger().process_payment_result;
        self.staged_payments.push(posting.clone());
        Ok(result)
    }

    async fn adjustment_id_exists(&mut self, _adjustment_id: i64) -> Result<bool, AppError> {
        let mut ledger = self.ledger();
        ledger.adjustment_id_checks += 1;
        Ok(ledger.adjustment_ids_exhausted)
    }

    async fn adjust_bill(&mut self, posting: &AdjustmentPosting) -> Result<i32, AppError> {
        self.check()?;
        let result = self.ledger().adjust_bill_result;
        self.staged_adjustments.push(posting.clone());
        Ok(result)
    }

    async fn commit(&mut self) -> Result<(), AppError> {
        if self.finished {
            return Err(AppError::DatabaseError(anyhow::anyhow!(
                "Transaction already finished"
            )));
        }
        self.finished = true;
        let payments = std::mem::take(&mut self.staged_payments);
        let adjustments = std::mem::take(&mut self.staged_adjustments);
        let mut ledger = self.ledger();
        ledger.commits += 1;
        ledger.committed_payments.extend(payments);
        ledger.committed_adjustments.extend(adjustments);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), AppError> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.staged_payments.clear();
        self.staged_adjustments.clear();
        self.ledger().rollbacks += 1;
        Ok(())
    }
}

/// Router over the in-memory gateway with the clock pinned to `now`.
pub fn test_router(gateway: &InMemoryGateway, now: NaiveDateTime) -> Router {
    let state = AppState::new(Arc::new(gateway.clone()), Arc::new(FixedClock(now)));
    build_router(state, "static")
}

/// Send a request and collect the status, headers and body text.
pub async fn send(router: Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, String) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
}

pub async fn get(router: Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, String) {
    send(
        router,
        Request::builder().uri(uri).body(Body::empty()).unwrap(),
    )
    .await
}

pub async fn post_form(router: Router, uri: &str, body: &str) -> (StatusCode, String) {
    let (status, _, text) = send(
        router,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await;
    (status, text)
}

pub fn json(body: &str) -> serde_json::Value {
    serde_json::from_str(body).unwrap()
}
