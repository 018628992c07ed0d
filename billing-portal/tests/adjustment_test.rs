//! Bill adjustment workflow and original amount lookup tests.

mod common;

use axum::http::StatusCode;
use billing_portal::error::BillingError;
use billing_portal::models::AdjustmentForm;
use billing_portal::services::adjustments::ADJUSTMENT_ID_ATTEMPTS;
use billing_portal::services::AdjustmentWorkflow;
use billing_portal::utils::FixedClock;
use chrono::NaiveDateTime;
use common::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

fn workflow(gateway: &InMemoryGateway, now: NaiveDateTime) -> AdjustmentWorkflow {
    AdjustmentWorkflow::new(Arc::new(gateway.clone()), Arc::new(FixedClock(now)))
}

fn form(adjustment_amount: Decimal) -> AdjustmentForm {
    AdjustmentForm {
        bill_id: BILL_ID,
        officer_name: "R. Malik".to_string(),
        officer_designation: "Revenue Officer".to_string(),
        original_bill_amount: dec!(100.00),
        adjustment_amount,
        adjustment_reason: "Meter misread in December".to_string(),
    }
}

#[tokio::test]
async fn adjustment_is_posted_and_committed() {
    let gateway = InMemoryGateway::new();

    let receipt = workflow(&gateway, before_due())
        .submit(&form(dec!(25.50)))
        .await
        .unwrap();

    assert!((100_000..=999_999).contains(&receipt.adjustment_id));
    assert_eq!(receipt.bill_id, BILL_ID);
    assert_eq!(receipt.adjustment_amount, dec!(25.50));
    assert_eq!(receipt.original_bill_amount, dec!(100.00));
    assert_eq!(receipt.adjustment_date_label(), "2024-01-05 09:30:00");

    let ledger = gateway.ledger();
    assert_eq!(ledger.commits, 1);
    assert_eq!(ledger.locked_bills, vec![BILL_ID]);
    assert_eq!(ledger.committed_adjustments.len(), 1);
    let posting = &ledger.committed_adjustments[0];
    assert_eq!(posting.adjustment_id, receipt.adjustment_id);
    assert_eq!(posting.officer_designation, "Revenue Officer");
    assert_eq!(posting.adjustment_reason, "Meter misread in December");
}

#[tokio::test]
async fn adjustment_above_original_amount_is_rejected() {
    let gateway = InMemoryGateway::new();

    let err = workflow(&gateway, before_due())
        .submit(&form(dec!(120)))
        .await
        .unwrap_err();

    assert!(matches!(err, BillingError::ExcessiveAdjustment { .. }));
    assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

    let ledger = gateway.ledger();
    assert_eq!(ledger.commits, 0);
    assert_eq!(ledger.rollbacks, 1);
    assert!(ledger.committed_adjustments.is_empty());
}

#[tokio::test]
async fn adjustment_is_compared_with_original_not_outstanding() {
    // 80 already paid: only 20 outstanding, but 50 <= original 100
    let gateway = InMemoryGateway::new().with(|l| {
        let bill = l.bills.get_mut(&BILL_ID).unwrap();
        bill.total_paid = dec!(80);
        bill.payment_status = Some("Partially Paid".to_string());
    });

    let receipt = workflow(&gateway, before_due())
        .submit(&form(dec!(50)))
        .await
        .unwrap();

    assert_eq!(receipt.adjustment_amount, dec!(50));
}

#[tokio::test]
async fn settled_bill_cannot_be_adjusted() {
    let gateway = InMemoryGateway::new().with(|l| {
        l.bills.get_mut(&BILL_ID).unwrap().payment_status = Some("Fully Paid".to_string());
    });

    let err = workflow(&gateway, before_due())
        .submit(&form(dec!(10)))
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "The bill is already fully paid. Adjustment not allowed."
    );
}

#[tokio::test]
async fn bill_with_nothing_outstanding_cannot_be_adjusted() {
    let gateway = InMemoryGateway::new().with(|l| {
        let bill = l.bills.get_mut(&BILL_ID).unwrap();
        bill.total_paid = dec!(100);
        bill.payment_status = Some("Partially Paid".to_string());
    });

    let err = workflow(&gateway, before_due())
        .submit(&form(dec!(10)))
        .await
        .unwrap_err();

    assert!(matches!(err, BillingError::AlreadySettled(_)));
    assert!(gateway.ledger().committed_adjustments.is_empty());
}

#[tokio::test]
async fn rejected_adjustment_is_not_committed() {
    let gateway = InMemoryGateway::new().with(|l| l.adjust_bill_result = -1);

    let err = workflow(&gateway, before_due())
        .submit(&form(dec!(10)))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Adjustment failed. Please check your inputs.");
    let ledger = gateway.ledger();
    assert_eq!(ledger.commits, 0);
    assert_eq!(ledger.rollbacks, 1);
}

#[tokio::test]
async fn exhausted_adjustment_ids_fail_after_bounded_retries() {
    let gateway = InMemoryGateway::new().with(|l| l.adjustment_ids_exhausted = true);

    let err = workflow(&gateway, before_due())
        .submit(&form(dec!(10)))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Failed to process bill adjustment");
    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

    let ledger = gateway.ledger();
    assert_eq!(ledger.adjustment_id_checks, ADJUSTMENT_ID_ATTEMPTS);
    assert_eq!(ledger.rollbacks, 1);
    assert!(ledger.committed_adjustments.is_empty());
}

#[tokio::test]
async fn blank_officer_name_fails_validation() {
    let gateway = InMemoryGateway::new();

    let err = workflow(&gateway, before_due())
        .submit(&AdjustmentForm {
            officer_name: String::new(),
            ..form(dec!(10))
        })
        .await
        .unwrap_err();

    assert!(matches!(err, BillingError::InvalidInput(_)));
    assert_eq!(
        err.to_string(),
        "Invalid input: Officer name must be 1-100 characters"
    );
    assert_eq!(gateway.ledger().begins, 0);
}

#[tokio::test]
async fn adjustment_form_renders_receipt_page() {
    let gateway = InMemoryGateway::new();
    let router = test_router(&gateway, before_due());

    let (status, body) = post_form(
        router,
        "/bill-adjustments",
        "bill_id=7&officer_name=R.+Malik&officer_designation=Revenue+Officer\
         &original_bill_amount=100&adjustment_amount=12.5&adjustment_reason=Meter+misread",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Adjustment Receipt"));
    assert!(body.contains("12.50"));
    assert!(body.contains("100.00"));
    assert!(body.contains("Revenue Officer"));
}

#[tokio::test]
async fn excessive_adjustment_renders_json_error() {
    let gateway = InMemoryGateway::new();
    let router = test_router(&gateway, before_due());

    let (status, body) = post_form(
        router,
        "/bill-adjustments",
        "bill_id=7&officer_name=R.+Malik&officer_designation=Revenue+Officer\
         &original_bill_amount=100&adjustment_amount=120&adjustment_reason=Meter+misread",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json(&body)["error"]
        .as_str()
        .unwrap()
        .contains("Adjustment not allowed."));
}

#[tokio::test]
async fn original_bill_amount_is_a_json_number() {
    let gateway = InMemoryGateway::new();
    let router = test_router(&gateway, before_due());

    let (status, _, body) = get(router, "/get-original-bill-amount/7").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["original_bill_amount"], serde_json::json!(100.0));
}

#[tokio::test]
async fn original_bill_amount_for_unknown_bill_is_not_found() {
    let gateway = InMemoryGateway::new();
    let router = test_router(&gateway, before_due());

    let (status, _, body) = get(router, "/get-original-bill-amount/404").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json(&body)["error"], "Invalid Bill ID");
}

#[tokio::test]
async fn original_bill_amount_lookup_failure_is_a_server_error() {
    let gateway = InMemoryGateway::new().with(|l| l.failing = true);
    let router = test_router(&gateway, before_due());

    let (status, _, body) = get(router, "/get-original-bill-amount/7").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json(&body)["error"], "Failed to fetch original bill amount");
}
