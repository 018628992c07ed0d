//! Bill statement (retrieval) models.

use super::PaymentStatus;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::FromRow;
use validator::Validate;

const NOT_APPLICABLE: &str = "N/A";

fn or_not_applicable(value: &Option<Decimal>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| NOT_APPLICABLE.to_string())
}

/// Submitted bill retrieval form.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StatementQuery {
    #[validate(length(min = 1, max = 50, message = "Customer ID must be 1-50 characters"))]
    pub customer_id: String,
    #[validate(length(min = 1, max = 50, message = "Connection ID must be 1-50 characters"))]
    pub connection_id: String,
    #[validate(range(min = 1, max = 12, message = "Billing month must be between 1 and 12"))]
    pub month: i32,
    #[validate(range(min = 1900, max = 9999, message = "Billing year is out of range"))]
    pub year: i32,
}

/// Customer, connection, division and bill columns for one billing month.
#[derive(Debug, Clone, FromRow)]
pub struct StatementHeader {
    pub customer_id: String,
    pub first_name: String,
    pub last_name: String,
    pub customer_address: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub connection_id: String,
    pub connection_type: String,
    pub division_name: String,
    pub sub_div_name: String,
    pub installation_date: NaiveDate,
    pub meter_type: String,
    pub bill_issue_date: NaiveDateTime,
    pub net_peak_units: i64,
    pub net_off_peak_units: i64,
    pub total_amount_before_due_date: Decimal,
    pub due_date: NaiveDateTime,
    pub total_amount_after_due_date: Decimal,
    pub billing_month: i32,
    pub billing_year: i32,
}

impl StatementHeader {
    pub fn customer_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn issue_date_label(&self) -> String {
        self.bill_issue_date.format("%Y-%m-%d").to_string()
    }

    pub fn due_date_label(&self) -> String {
        self.due_date.format("%Y-%m-%d").to_string()
    }

    pub fn installation_date_label(&self) -> String {
        self.installation_date.format("%Y-%m-%d").to_string()
    }
}

/// An earlier bill of the same connection.
#[derive(Debug, Clone, FromRow)]
pub struct PreviousBill {
    pub billing_month: i32,
    pub billing_year: i32,
    pub total_amount_before_due_date: Decimal,
    pub due_date: NaiveDateTime,
    pub payment_status: Option<String>,
}

impl PreviousBill {
    pub fn period_label(&self) -> String {
        format!("{}-{:02}", self.billing_year, self.billing_month)
    }

    pub fn due_date_label(&self) -> String {
        self.due_date.format("%Y-%m-%d").to_string()
    }

    pub fn status_label(&self) -> &'static str {
        self.payment_status
            .as_deref()
            .map(|s| PaymentStatus::from_string(s).as_str())
            .unwrap_or(NOT_APPLICABLE)
    }
}

/// Values produced by the `fun_compute_*` stored functions.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedCharges {
    pub billing_days: i32,
    pub import_peak_units: i64,
    pub import_off_peak_units: i64,
    pub export_off_peak_units: i64,
    pub peak_amount: Decimal,
    pub off_peak_amount: Decimal,
    pub tax_amount: Decimal,
    pub fixed_fee: Decimal,
    pub subsidy_amount: Decimal,
    pub arrears: Decimal,
}

#[derive(Debug, Clone, FromRow)]
pub struct SubsidyRate {
    pub subsidy_name: String,
    pub provider_name: String,
    pub rate_per_unit: Decimal,
    pub threshold_low: Decimal,
    pub threshold_high: Decimal,
}

#[derive(Debug, Clone, FromRow)]
pub struct TariffRate {
    pub tariff_code: String,
    pub rate_per_unit: Decimal,
    pub min_amount: Decimal,
    pub min_unit: Decimal,
    pub threshold_low: Decimal,
    pub threshold_high: Decimal,
    pub tariff_description: String,
    /// 1 = peak, 2 = off-peak.
    pub tariff_type: i32,
}

#[derive(Debug, Clone, FromRow)]
pub struct TaxRate {
    pub tax_name: String,
    pub tax_rate: Decimal,
}

#[derive(Debug, Clone, FromRow)]
pub struct FixedCharge {
    pub charge_name: String,
    pub amount: Decimal,
}

/// A subsidy line on the statement. Threshold and rate columns are empty
/// on the "no subsidy" placeholder.
#[derive(Debug, Clone, PartialEq)]
pub struct SubsidyLine {
    pub name: String,
    pub provider_name: String,
    pub rate_per_unit: Option<Decimal>,
    pub threshold_low: Option<Decimal>,
    pub threshold_high: Option<Decimal>,
    pub amount: Decimal,
}

impl SubsidyLine {
    pub fn placeholder() -> Self {
        Self {
            name: "No Subsidy Found".to_string(),
            provider_name: NOT_APPLICABLE.to_string(),
            rate_per_unit: None,
            threshold_low: None,
            threshold_high: None,
            amount: Decimal::ZERO,
        }
    }

    pub fn rate_label(&self) -> String {
        or_not_applicable(&self.rate_per_unit)
    }

    pub fn threshold_low_label(&self) -> String {
        or_not_applicable(&self.threshold_low)
    }

    pub fn threshold_high_label(&self) -> String {
        or_not_applicable(&self.threshold_high)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TariffLine {
    pub name: String,
    pub units: i64,
    pub rate: Decimal,
    pub amount: Decimal,
    pub normalized_min_units: Option<Decimal>,
    pub threshold_low: Option<Decimal>,
    pub threshold_high: Option<Decimal>,
}

impl TariffLine {
    pub fn placeholder() -> Self {
        Self {
            name: "No Tariff Found".to_string(),
            units: 0,
            rate: Decimal::ZERO,
            amount: Decimal::ZERO,
            normalized_min_units: None,
            threshold_low: None,
            threshold_high: None,
        }
    }

    pub fn normalized_min_units_label(&self) -> String {
        or_not_applicable(&self.normalized_min_units)
    }

    pub fn threshold_low_label(&self) -> String {
        or_not_applicable(&self.threshold_low)
    }

    pub fn threshold_high_label(&self) -> String {
        or_not_applicable(&self.threshold_high)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaxLine {
    pub name: String,
    pub rate: Decimal,
    pub amount: Decimal,
}

/// Everything the bill details page renders.
#[derive(Debug, Clone)]
pub struct BillStatement {
    pub header: StatementHeader,
    pub charges: ComputedCharges,
    pub tariffs: Vec<TariffLine>,
    pub subsidies: Vec<SubsidyLine>,
    pub taxes: Vec<TaxLine>,
    pub fixed_charges: Vec<FixedCharge>,
    pub previous_bills: Vec<PreviousBill>,
}
