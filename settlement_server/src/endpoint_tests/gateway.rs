use actix_web::{http::StatusCode, test::TestRequest};
use settlement_engine::{
    records::WebhookFields,
    settlement_objects::SettlementOutcome,
    test_utils::fixtures::{signed_webhook, BUYER_EMAIL},
    SettlementError,
    TransientDatabaseError,
};

use super::{
    helpers::{call, completed_payment},
    mocks::MockLedger,
};

fn webhook(fields: &WebhookFields) -> TestRequest {
    TestRequest::post().uri("/gateway/webhook").set_form(fields)
}

fn success() -> WebhookFields {
    signed_webhook("TX1", "EVENT_5_1000", "100.00", BUYER_EMAIL, "SUCCESS")
}

fn nothing_is_written(ledger: &mut MockLedger) {
    ledger.expect_settle_payment().never();
    ledger.expect_reverse_settlement().never();
    ledger.expect_fetch_payment().never();
}

#[actix_web::test]
async fn forged_callback_is_unauthorized() {
    let mut fields = success();
    fields.amount = "1.00".to_string();
    let res = call(webhook(&fields), nothing_is_written).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.content_type.as_deref(), Some("application/json"));
    assert_eq!(res.json()["error"], "The gateway signature is invalid.");
}

#[actix_web::test]
async fn unsigned_callback_is_unauthorized() {
    let mut fields = success();
    fields.hash = String::new();
    let res = call(webhook(&fields), nothing_is_written).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn unrecognised_order_is_a_bad_request() {
    let fields = signed_webhook("TX1", "Weekend_in_Taipei", "100.00", BUYER_EMAIL, "SUCCESS");
    let res = call(webhook(&fields), nothing_is_written).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(res.json()["error"].as_str().unwrap().contains("Weekend_in_Taipei"));
}

#[actix_web::test]
async fn callback_must_be_form_encoded() {
    let req = TestRequest::post()
        .uri("/gateway/webhook")
        .insert_header(("content-type", "application/json"))
        .set_payload(r#"{"transaction_id":"TX1"}"#);
    let res = call(req, nothing_is_written).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(res.json()["error"].is_string());
}

#[actix_web::test]
async fn duplicate_callback_is_acknowledged() {
    let res = call(webhook(&success()), |ledger| {
        ledger.expect_settle_payment().returning(|request, _| {
            assert_eq!(request.record.transaction_id, "TX1");
            Ok(SettlementOutcome::AlreadyProcessed(completed_payment("TX1", "EVENT_5_1000", 100)))
        });
    })
    .await;
    assert_eq!(res.status, StatusCode::OK);
    let json = res.json();
    assert_eq!(json["success"], true);
    assert_eq!(json["outcome"], "already_processed");
    assert_eq!(json["message"], "Transaction TX1 was already processed");
    assert_eq!(json["amount"], "100.00");
}

#[actix_web::test]
async fn sold_out_event_is_a_conflict() {
    let res = call(webhook(&success()), |ledger| {
        ledger.expect_settle_payment().returning(|_, _| Err(SettlementError::InventoryExhausted(5)));
    })
    .await;
    assert_eq!(res.status, StatusCode::CONFLICT);
    assert_eq!(res.json()["error"], "The request conflicts with the current state. Event 5 has no tickets left");
}

#[actix_web::test]
async fn busy_database_asks_the_gateway_to_retry() {
    let res = call(webhook(&success()), |ledger| {
        ledger.expect_settle_payment().returning(|_, _| Err(TransientDatabaseError::PoolTimedOut.into()));
    })
    .await;
    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
}

#[actix_web::test]
async fn failed_payment_is_recorded() {
    let fields = signed_webhook("TX2", "EVENT_5_1001", "100.00", BUYER_EMAIL, "FAILED");
    let res = call(webhook(&fields), |ledger| {
        ledger.expect_settle_payment().never();
        ledger.expect_fetch_payment().returning(|_| Ok(None));
    })
    .await;
    assert_eq!(res.status, StatusCode::OK);
    let json = res.json();
    assert_eq!(json["outcome"], "failure_recorded");
    assert_eq!(json["transaction_id"], "TX2");
    assert!(json["reversed"].is_null());
}
