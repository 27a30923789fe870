use cucumber::{given, then, when};
use settlement_engine::{
    db_types::Money,
    records::WebhookFields,
    settlement_objects::ReversalOutcome,
    test_utils::fixtures::{insert_user, signed_webhook},
    LedgerQueries,
    SettlementError,
    WebhookOutcome,
};

use crate::cucumber::{settlement_world::SettlementSystem, SettlementWorld};

#[given("a seeded marketplace")]
async fn seeded_marketplace(world: &mut SettlementWorld) {
    world.system = Some(SettlementSystem::new().await);
}

#[given(expr = "event {int} has {int} ticket(s) left")]
async fn set_inventory(world: &mut SettlementWorld, event_id: i64, tickets: i64) {
    sqlx::query("UPDATE events SET available_tickets = ? WHERE id = ?")
        .bind(tickets)
        .bind(event_id)
        .execute(world.system().db.pool())
        .await
        .expect("Error updating inventory");
}

#[given(expr = "a buyer {word} with no referrer")]
async fn unreferred_buyer(world: &mut SettlementWorld, email: String) {
    insert_user(&world.system().db, &email, "Walk-in", None).await;
}

#[when(expr = "the gateway reports {word} for transaction {word} on order {word} of {word} from {word}")]
async fn gateway_reports(
    world: &mut SettlementWorld,
    status: String,
    transaction_id: String,
    order_id: String,
    amount: String,
    email: String,
) {
    let fields = signed_webhook(&transaction_id, &order_id, &amount, &email, &status);
    deliver(world, fields).await;
}

#[when(expr = "a forged callback reports SUCCESS for transaction {word} on order {word} of {word}")]
async fn forged_callback(world: &mut SettlementWorld, transaction_id: String, order_id: String, amount: String) {
    let mut fields = signed_webhook(&transaction_id, &order_id, &amount, "mallory@example.com", "SUCCESS");
    fields.amount = "0.01".to_string();
    deliver(world, fields).await;
}

async fn deliver(world: &mut SettlementWorld, fields: WebhookFields) {
    let outcome = world.api().process_webhook(&fields).await;
    world.last_outcome = Some(outcome);
}

#[when(expr = "transaction {word} is refunded")]
async fn refund(world: &mut SettlementWorld, transaction_id: String) {
    let outcome = world.api().refunds().refund(&transaction_id).await.expect("Error refunding transaction");
    assert!(matches!(outcome, ReversalOutcome::Reversed(_)), "Expected a reversal, got {outcome:?}");
}

#[then("the callback is settled")]
async fn callback_settled(world: &mut SettlementWorld) {
    let outcome = world.take_outcome();
    assert!(matches!(outcome, Ok(WebhookOutcome::Settled(_))), "Expected a settlement, got {outcome:?}");
}

#[then("the callback was already processed")]
async fn callback_duplicate(world: &mut SettlementWorld) {
    let outcome = world.take_outcome();
    assert!(matches!(outcome, Ok(WebhookOutcome::AlreadyProcessed(_))), "Expected a duplicate, got {outcome:?}");
}

#[then("the callback records a failure")]
async fn callback_failure(world: &mut SettlementWorld) {
    let outcome = world.take_outcome();
    assert!(matches!(outcome, Ok(WebhookOutcome::FailureRecorded { .. })), "Expected a failure, got {outcome:?}");
}

#[then("the callback is rejected as forged")]
async fn callback_forged(world: &mut SettlementWorld) {
    let outcome = world.take_outcome();
    assert!(matches!(outcome, Err(SettlementError::Authenticity)), "Expected a rejection, got {outcome:?}");
}

#[then(expr = "the callback is rejected because event {int} is sold out")]
async fn callback_sold_out(world: &mut SettlementWorld, event_id: i64) {
    let outcome = world.take_outcome();
    assert_eq!(outcome.unwrap_err(), SettlementError::InventoryExhausted(event_id));
}

#[then(expr = "event {int} has {int} ticket(s) left")]
async fn check_inventory(world: &mut SettlementWorld, event_id: i64, tickets: i64) {
    let event = world.system().db.fetch_event(event_id).await.expect("Error fetching event").expect("No such event");
    assert_eq!(event.available_tickets, tickets);
}

#[then(expr = "payment {word} is {word}")]
async fn check_payment(world: &mut SettlementWorld, transaction_id: String, status: String) {
    let payment = world.system().db.fetch_payment(&transaction_id).await.expect("Error fetching payment");
    match (payment, status.as_str()) {
        (None, "missing") => {},
        (Some(p), expected) => assert_eq!(p.status.to_string(), expected),
        (None, expected) => panic!("Payment {transaction_id} does not exist, expected it to be {expected}"),
    }
}

#[then(expr = "the {word} has earned {word}")]
async fn check_earnings(world: &mut SettlementWorld, role: String, amount: String) {
    let sys = world.system();
    let user_id = match role.as_str() {
        "creator" => sys.market.creator_id,
        "affiliate" => sys.market.affiliate_id,
        "buyer" => sys.market.buyer_id,
        other => panic!("Unknown marketplace role: {other}"),
    };
    let user = sys.db.fetch_user(user_id).await.expect("Error fetching user").expect("No such user");
    let expected = amount.parse::<Money>().expect("Not a money amount");
    assert_eq!(user.total_revenue, expected);
}

#[then(expr = "{int} notification(s) is/are waiting to be sent")]
async fn check_notifications(world: &mut SettlementWorld, count: usize) {
    assert_eq!(world.system().queue.stats().pending, count);
}
