mod support;

use settlement_engine::{
    db_types::{EntitlementStatus, Money, PaymentStatus, Purchase, RevenueStatus, ReversalKind, TicketStatus},
    notifications::Notification,
    settlement_objects::ReversalOutcome,
    test_utils::fixtures::{signed_webhook, BUYER_EMAIL},
    LedgerQueries,
    SettlementError,
    WebhookOutcome,
};
use support::TestSystem;

#[tokio::test]
async fn refund_reverses_the_whole_settlement() {
    let sys = TestSystem::new().await;
    let m = sys.market;
    let api = sys.settlement_api();
    let fields = signed_webhook("TX1", "EVENT_5_1000", "100.00", BUYER_EMAIL, "SUCCESS");
    api.process_webhook(&fields).await.unwrap();
    assert_eq!(sys.event(5).await.available_tickets, 0);

    let outcome = api.refunds().refund("TX1").await.expect("Error refunding");
    let ReversalOutcome::Reversed(receipt) = outcome else {
        panic!("Expected a reversal, got {outcome:?}");
    };
    assert_eq!(receipt.kind, ReversalKind::Refunded);
    assert_eq!(receipt.payment.status, PaymentStatus::Refunded);
    let Some(Purchase::Ticket(ticket)) = &receipt.purchase else {
        panic!("Expected the refunded ticket");
    };
    assert_eq!(ticket.status, TicketStatus::Refunded);
    assert_eq!(receipt.reversed_revenue.len(), 2);
    assert!(receipt.reversed_revenue.iter().all(|r| r.status == RevenueStatus::Refunded));

    assert_eq!(sys.event(5).await.available_tickets, 1);
    assert_eq!(sys.total_revenue(m.creator_id).await, Money::default());
    assert_eq!(sys.total_revenue(m.affiliate_id).await, Money::default());
    let revenue = sys.db.fetch_revenue_for_transaction("TX1").await.unwrap();
    assert!(revenue.creator.iter().chain(revenue.affiliate.iter()).all(|r| r.status == RevenueStatus::Refunded));
    // purchase confirmation + refund notice
    assert_eq!(sys.queue.stats().pending, 2);

    let again = api.refunds().refund("TX1").await.unwrap();
    assert!(matches!(again, ReversalOutcome::AlreadyReversed(ref p) if p.status == PaymentStatus::Refunded));
    assert_eq!(sys.event(5).await.available_tickets, 1);
    assert_eq!(sys.total_revenue(m.creator_id).await, Money::default());
    assert_eq!(sys.queue.stats().pending, 2);

    // The ticket is back on sale
    let fields = signed_webhook("TX2", "EVENT_5_1001", "100.00", BUYER_EMAIL, "SUCCESS");
    assert!(matches!(api.process_webhook(&fields).await, Ok(WebhookOutcome::Settled(_))));
    assert_eq!(sys.total_revenue(m.creator_id).await, Money::from_major(100));
}

#[tokio::test]
async fn refunding_an_unknown_transaction() {
    let sys = TestSystem::new().await;
    let api = sys.settlement_api();
    let err = api.refunds().refund("NOPE").await.unwrap_err();
    assert_eq!(err, SettlementError::PaymentNotFound("NOPE".into()));
}

#[tokio::test]
async fn failed_payment_without_settlement_only_notifies() {
    let sys = TestSystem::new().await;
    let api = sys.settlement_api();
    let fields = signed_webhook("TX1", "EVENT_5_1000", "100.00", BUYER_EMAIL, "FAILED");
    let outcome = api.process_webhook(&fields).await.unwrap();
    assert!(matches!(
        outcome,
        WebhookOutcome::FailureRecorded { ref transaction_id, reversed: None } if transaction_id == "TX1"
    ));
    assert!(sys.db.fetch_payment("TX1").await.unwrap().is_none());
    assert_eq!(sys.event(5).await.available_tickets, 1);
    assert_eq!(sys.queue.stats().pending, 1);

    // Failed callbacks do not need a recognisable order id
    let fields = signed_webhook("TX2", "Weekend_in_Taipei", "100.00", BUYER_EMAIL, "FAILED");
    assert!(matches!(api.process_webhook(&fields).await, Ok(WebhookOutcome::FailureRecorded { .. })));
}

#[tokio::test]
async fn late_failure_reverses_a_settled_video() {
    let sys = TestSystem::new().await;
    let m = sys.market;
    let api = sys.settlement_api();
    let fields = signed_webhook("TX1", "MOVIE_7_1", "20.00", BUYER_EMAIL, "SUCCESS");
    api.process_webhook(&fields).await.unwrap();
    assert_eq!(sys.total_revenue(m.affiliate_id).await, Money::from_major(3));

    let fields = signed_webhook("TX1", "MOVIE_7_1", "20.00", BUYER_EMAIL, "FAILED");
    let outcome = api.process_webhook(&fields).await.unwrap();
    let WebhookOutcome::FailureRecorded { reversed: Some(receipt), .. } = outcome else {
        panic!("Expected the settlement to be reversed, got {outcome:?}");
    };
    assert_eq!(receipt.kind, ReversalKind::Failed);
    assert_eq!(receipt.payment.status, PaymentStatus::Failed);
    assert!(matches!(receipt.purchase, Some(Purchase::Video(ref v)) if v.status == EntitlementStatus::Cancelled));
    assert_eq!(sys.total_revenue(m.creator_id).await, Money::default());
    assert_eq!(sys.total_revenue(m.affiliate_id).await, Money::default());

    // A repeated failure report is a no-op, and the buyer is not told twice
    let pending = sys.queue.stats().pending;
    let outcome = api.process_webhook(&fields).await.unwrap();
    assert!(matches!(outcome, WebhookOutcome::FailureRecorded { reversed: None, .. }));
    assert_eq!(sys.queue.stats().pending, pending);
    let payment = sys.db.fetch_payment("TX1").await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Failed);
}

#[tokio::test]
async fn refund_notice_goes_to_the_buyer() {
    let sys = TestSystem::new().await;
    let api = sys.settlement_api();
    let fields = signed_webhook("TX1", "MOVIE_7_1", "20.00", BUYER_EMAIL, "SUCCESS");
    api.process_webhook(&fields).await.unwrap();
    let ReversalOutcome::Reversed(receipt) = api.refunds().refund("TX1").await.unwrap() else {
        panic!("Expected a reversal");
    };
    let notice = Notification::refund_initiated(&receipt).unwrap();
    assert_eq!(notice.recipient(), BUYER_EMAIL);
    assert_eq!(notice.kind(), "refund_initiated");
    let stats = sys.queue.stats();
    assert_eq!(stats.pending, 2);
    assert_eq!(stats.failed, 0);
}
