//! Workflow error taxonomy and its HTTP rendering.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde_json::json;
use thiserror::Error;

/// Outcomes that stop a billing workflow. Every variant renders as
/// `{"error": "<message>"}`.
#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A submitted identifier does not resolve to a row.
    #[error("{0}")]
    InvalidReference(&'static str),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    AlreadySettled(&'static str),

    #[error("No outstanding amount to pay.")]
    NothingOwed,

    #[error("The payment amount (${amount}) exceeds the outstanding amount (${outstanding}).")]
    Overpayment {
        amount: Decimal,
        outstanding: Decimal,
    },

    #[error("Adjustment amount (${adjustment}) exceeds the original bill amount (${original}). Adjustment not allowed.")]
    ExcessiveAdjustment {
        adjustment: Decimal,
        original: Decimal,
    },

    /// The posting function answered with its `-1` sentinel.
    #[error("{0}")]
    PostingRejected(&'static str),

    #[error("{0}")]
    PostingFailed(&'static str),

    #[error("Failed to retrieve bill details")]
    AggregationFailed,

    #[error("{0}")]
    LookupFailed(&'static str),
}

impl BillingError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            BillingError::NotFound(_) => StatusCode::NOT_FOUND,
            BillingError::PostingFailed(_)
            | BillingError::AggregationFailed
            | BillingError::LookupFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            BillingError::InvalidInput(_)
            | BillingError::InvalidReference(_)
            | BillingError::AlreadySettled(_)
            | BillingError::NothingOwed
            | BillingError::Overpayment { .. }
            | BillingError::ExcessiveAdjustment { .. }
            | BillingError::PostingRejected(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            BillingError::InvalidInput(_) => "invalid_input",
            BillingError::InvalidReference(_) => "invalid_reference",
            BillingError::NotFound(_) => "not_found",
            BillingError::AlreadySettled(_) => "already_settled",
            BillingError::NothingOwed => "nothing_owed",
            BillingError::Overpayment { .. } => "overpayment",
            BillingError::ExcessiveAdjustment { .. } => "excessive_adjustment",
            BillingError::PostingRejected(_) => "posting_rejected",
            BillingError::PostingFailed(_) => "posting_failed",
            BillingError::AggregationFailed => "aggregation_failed",
            BillingError::LookupFailed(_) => "lookup_failed",
        }
    }
}

impl From<validator::ValidationErrors> for BillingError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = err
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| match &e.message {
                    Some(message) => message.to_string(),
                    None => format!("{} is invalid", field),
                })
            })
            .collect();
        messages.sort();

        BillingError::InvalidInput(messages.join("; "))
    }
}

impl IntoResponse for BillingError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn overpayment_message_quotes_both_amounts() {
        let err = BillingError::Overpayment {
            amount: dec!(150),
            outstanding: dec!(110.00),
        };
        assert_eq!(
            err.to_string(),
            "The payment amount ($150) exceeds the outstanding amount ($110.00)."
        );
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn validation_failures_list_field_messages() {
        use crate::models::StatementQuery;
        use validator::Validate;

        let query = StatementQuery {
            customer_id: String::new(),
            connection_id: "CN-55".to_string(),
            month: 13,
            year: 2024,
        };
        let err = BillingError::from(query.validate().unwrap_err());

        assert_eq!(
            err.to_string(),
            "Invalid input: Billing month must be between 1 and 12; Customer ID must be 1-50 characters"
        );
        assert!(!err.to_string().contains("Number("));
    }

    #[test]
    fn infrastructure_failures_are_server_errors() {
        assert_eq!(
            BillingError::PostingFailed("Failed to process payment").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            BillingError::AggregationFailed.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            BillingError::NotFound("No bill found for the given inputs").status_code(),
            StatusCode::NOT_FOUND
        );
    }
}
