use std::collections::HashSet;

use actix_web::{http::StatusCode, test::TestRequest};
use settlement_engine::{
    settlement_objects::{BatchOutcome, RecordSkip, SkipReason},
    test_utils::fixtures::export_csv,
    SettlementError,
};

use super::{helpers::call, mocks::MockLedger};

fn export() -> Vec<u8> {
    export_csv(&[
        ["TX10", "EVENT_5_1000", "Alice alice@example.com", "100.00", "SUCCESS", "FPX", "", "2024-03-01 10:00:00"],
        ["TX11", "Weekend_in_Taipei", "Carl carl@example.com", "55.00", "SUCCESS", "FPX", "", "2024-03-01 11:00:00"],
        ["TX12", "EVENT_5_1001", "Bob bob@example.com", "100.00", "SUCCESS", "Boost", "", "2024-03-01 12:00:00"],
        ["TX13", "EVENT_5_1002", "Erin erin@example.com", "100.00", "FAILED", "FPX", "", "2024-03-01 13:00:00"],
    ])
}

fn upload(path: &str) -> TestRequest {
    TestRequest::post().uri(path).insert_header(("content-type", "text/csv")).set_payload(export())
}

fn tx10_is_settled(ledger: &mut MockLedger) {
    ledger.expect_existing_transaction_ids().returning(|ids| {
        Ok(ids.iter().filter(|id| id.as_str() == "TX10").cloned().collect::<HashSet<_>>())
    });
    ledger.expect_settle_recovery_batch().never();
}

#[actix_web::test]
async fn preview_reports_without_settling() {
    let res = call(upload("/api/recovery/preview"), tx10_is_settled).await;
    assert_eq!(res.status, StatusCode::OK);
    let json = res.json();
    assert_eq!(json["totalRecords"], 4);
    assert_eq!(json["eventRecords"], 3);
    assert_eq!(json["nonEventRecords"], 1);
    assert_eq!(json["successRecords"], 2);
    assert_eq!(json["alreadyProcessed"], 1);
    assert_eq!(json["toRecover"], 1);
    assert_eq!(json["byPaymentMethod"]["Boost"], 1);
}

#[actix_web::test]
async fn empty_upload_is_a_bad_request() {
    let req = TestRequest::post().uri("/api/recovery/preview");
    let res = call(req, |ledger| {
        ledger.expect_existing_transaction_ids().never();
    })
    .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json()["error"], "Could not read request body: No export file was uploaded");
}

#[actix_web::test]
async fn spreadsheet_that_is_not_a_spreadsheet() {
    let res = call(upload("/api/recovery/preview?format=xlsx"), |ledger| {
        ledger.expect_existing_transaction_ids().never();
    })
    .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn export_contains_only_records_to_recover() {
    let res = call(upload("/api/recovery/export?output=csv"), tx10_is_settled).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.content_type.as_deref(), Some("text/csv"));
    let lines = res.body.lines().collect::<Vec<_>>();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("Transaction ID,Order ID"));
    assert!(lines[1].starts_with("TX12,EVENT_5_1001"));
}

#[actix_web::test]
async fn run_reports_skipped_records() {
    let res = call(upload("/api/recovery/run"), |ledger| {
        ledger.expect_existing_transaction_ids().returning(|_| Ok(HashSet::new()));
        ledger.expect_settle_recovery_batch().returning(|requests, _| {
            let skipped = requests
                .iter()
                .map(|r| RecordSkip {
                    transaction_id: r.record.transaction_id.clone(),
                    order_id: r.record.order_id.clone(),
                    customer_email: r.record.customer_email.clone(),
                    reason: SkipReason::InventoryExhausted,
                    detail: "Event 5 has no tickets left".to_string(),
                })
                .collect();
            Ok(BatchOutcome { settled: vec![], skipped })
        });
    })
    .await;
    assert_eq!(res.status, StatusCode::OK);
    let json = res.json();
    assert_eq!(json["processed"], 0);
    assert_eq!(json["failed"], 2);
    assert_eq!(json["skippedDuringRecovery"].as_array().map(Vec::len), Some(2));
    assert_eq!(json["failedBatches"].as_array().map(Vec::len), Some(0));
}

#[actix_web::test]
async fn run_reports_failed_batches() {
    let res = call(upload("/api/recovery/run"), |ledger| {
        ledger.expect_existing_transaction_ids().returning(|_| Ok(HashSet::new()));
        ledger
            .expect_settle_recovery_batch()
            .returning(|_, _| Err(SettlementError::DatabaseError("disk I/O error".to_string())));
    })
    .await;
    assert_eq!(res.status, StatusCode::OK);
    let json = res.json();
    assert_eq!(json["processed"], 0);
    assert_eq!(json["failed"], 2);
    // FPX and Boost records are batched separately
    assert_eq!(json["failedBatches"].as_array().map(Vec::len), Some(2));
    assert_eq!(json["failedBatches"][0]["error"], "Database error: disk I/O error");
}
