//! Statement line matching for subsidies, tariffs and taxes.
//!
//! Callers must reject a non-positive `billing_days` before calling in.

use crate::models::{
    round_money, ComputedCharges, SubsidyLine, SubsidyRate, TariffLine, TariffRate, TaxLine,
    TaxRate,
};
use rust_decimal::Decimal;

const PEAK_TARIFF: i32 = 1;
const OFF_PEAK_TARIFF: i32 = 2;

/// Taxes shown on a statement.
pub const MAX_TAX_LINES: usize = 2;

fn hours_in_period(billing_days: i32) -> Decimal {
    Decimal::from(billing_days) * Decimal::from(24)
}

fn in_band(value: Decimal, low: Decimal, high: Decimal) -> bool {
    low <= value && value < high
}

/// Subsidy rows whose per-hour band covers the connection's combined
/// import consumption. Never empty.
pub fn match_subsidies(rates: &[SubsidyRate], charges: &ComputedCharges) -> Vec<SubsidyLine> {
    let hours = hours_in_period(charges.billing_days);
    let units_per_hour =
        Decimal::from(charges.import_peak_units + charges.import_off_peak_units) / hours;

    let lines: Vec<SubsidyLine> = rates
        .iter()
        .filter(|rate| in_band(units_per_hour, rate.threshold_low, rate.threshold_high))
        .map(|rate| SubsidyLine {
            name: rate.subsidy_name.clone(),
            provider_name: rate.provider_name.clone(),
            rate_per_unit: Some(rate.rate_per_unit),
            threshold_low: Some(rate.threshold_low),
            threshold_high: Some(rate.threshold_high),
            amount: round_money(units_per_hour * hours * rate.rate_per_unit),
        })
        .collect();

    if lines.is_empty() {
        vec![SubsidyLine::placeholder()]
    } else {
        lines
    }
}

/// Tariff rows whose per-hour band covers the usage of their kind. Never empty.
pub fn match_tariffs(rates: &[TariffRate], charges: &ComputedCharges) -> Vec<TariffLine> {
    let hours = hours_in_period(charges.billing_days);
    let days = Decimal::from(charges.billing_days);
    let month = Decimal::from(30);

    let mut lines = Vec::new();
    for rate in rates {
        let usage = match rate.tariff_type {
            PEAK_TARIFF => charges.import_peak_units,
            OFF_PEAK_TARIFF => charges.import_off_peak_units - charges.export_off_peak_units,
            _ => continue,
        };
        let usage_dec = Decimal::from(usage);
        if !in_band(usage_dec / hours, rate.threshold_low, rate.threshold_high) {
            continue;
        }

        let min_units = rate.min_unit * days / month;
        let min_amount = rate.min_amount * days / month;
        let amount = if usage_dec > min_units {
            min_amount + (usage_dec - min_units) * rate.rate_per_unit
        } else {
            min_amount
        };

        lines.push(TariffLine {
            name: rate.tariff_description.clone(),
            units: usage,
            rate: rate.rate_per_unit,
            amount: round_money(amount),
            normalized_min_units: Some(round_money(min_units)),
            threshold_low: Some(rate.threshold_low),
            threshold_high: Some(rate.threshold_high),
        });
    }

    if lines.is_empty() {
        lines.push(TariffLine::placeholder());
    }
    lines
}

/// Tax lines levied on the energy amounts. Only the first
/// [`MAX_TAX_LINES`] rates are surfaced.
pub fn tax_lines(rates: &[TaxRate], charges: &ComputedCharges) -> Vec<TaxLine> {
    let base = charges.peak_amount + charges.off_peak_amount;
    rates
        .iter()
        .take(MAX_TAX_LINES)
        .map(|rate| TaxLine {
            name: rate.tax_name.clone(),
            rate: rate.tax_rate,
            amount: base * rate.tax_rate,
        })
        .collect()
}
