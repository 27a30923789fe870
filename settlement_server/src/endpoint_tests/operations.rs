use actix_web::{http::StatusCode, test::TestRequest};
use settlement_engine::{
    db_types::{PaymentStatus, TransactionRevenue},
    settlement_objects::ReversalOutcome,
    test_utils::fixtures::{signed_webhook, BUYER_EMAIL},
    NotificationQueue,
    SettlementError,
};

use super::helpers::{call, call_with_queue, completed_payment};

#[actix_web::test]
async fn refunding_an_unknown_transaction() {
    let req = TestRequest::post().uri("/api/refunds/NOPE");
    let res = call(req, |ledger| {
        ledger.expect_reverse_settlement().returning(|tx, _, _| Err(SettlementError::PaymentNotFound(tx.to_string())));
    })
    .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.json()["error"], "The data was not found. No payment exists for transaction NOPE");
}

#[actix_web::test]
async fn repeated_refund_returns_the_payment() {
    let req = TestRequest::post().uri("/api/refunds/TX1");
    let res = call(req, |ledger| {
        ledger.expect_reverse_settlement().returning(|tx, _, _| {
            let mut payment = completed_payment(tx, "EVENT_5_1000", 100);
            payment.status = PaymentStatus::Refunded;
            Ok(ReversalOutcome::AlreadyReversed(payment))
        });
    })
    .await;
    assert_eq!(res.status, StatusCode::OK);
    let json = res.json();
    assert_eq!(json["outcome"], "already_reversed");
    assert_eq!(json["status"], "refunded");
}

#[actix_web::test]
async fn payment_lookup() {
    let req = TestRequest::get().uri("/api/payments/TX1");
    let res = call(req, |ledger| {
        ledger.expect_fetch_payment().returning(|tx| Ok(Some(completed_payment(tx, "EVENT_5_1000", 100))));
        ledger.expect_fetch_revenue_for_transaction().returning(|_| Ok(TransactionRevenue::default()));
    })
    .await;
    assert_eq!(res.status, StatusCode::OK);
    let json = res.json();
    assert_eq!(json["payment"]["transaction_id"], "TX1");
    assert_eq!(json["payment"]["status"], "completed");
    assert_eq!(json["revenue"]["creator"].as_array().map(Vec::len), Some(0));
}

#[actix_web::test]
async fn payment_lookup_for_an_unknown_transaction() {
    let req = TestRequest::get().uri("/api/payments/TX404");
    let res = call(req, |ledger| {
        ledger.expect_fetch_payment().returning(|_| Ok(None));
        ledger.expect_fetch_revenue_for_transaction().never();
    })
    .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn failure_notices_show_up_in_the_queue_stats() {
    let queue = NotificationQueue::default();
    let fields = signed_webhook("TX2", "EVENT_5_1001", "100.00", BUYER_EMAIL, "FAILED");
    let req = TestRequest::post().uri("/gateway/webhook").set_form(&fields);
    let res = call_with_queue(req, |ledger| {
        ledger.expect_fetch_payment().returning(|_| Ok(None));
    }, queue.clone())
    .await;
    assert_eq!(res.status, StatusCode::OK);

    let res = call_with_queue(TestRequest::get().uri("/api/notifications"), |_| {}, queue).await;
    assert_eq!(res.status, StatusCode::OK);
    let json = res.json();
    assert_eq!(json["pending"], 1);
    assert_eq!(json["failed"], 0);
}
