//! Catalogue seeding and gateway callback builders.
use settle_common::Secret;

use crate::{
    helpers::{GatewaySecrets, SecretVariant},
    records::WebhookFields,
    SqliteDatabase,
};

pub const TEST_GATEWAY_SECRET: &str = "gateway-production-secret";
pub const TEST_GATEWAY_SANDBOX_SECRET: &str = "gateway-sandbox-secret";

pub fn test_secrets() -> GatewaySecrets {
    GatewaySecrets::new(
        Secret::new(TEST_GATEWAY_SECRET.to_string()),
        Some(Secret::new(TEST_GATEWAY_SANDBOX_SECRET.to_string())),
    )
}

pub async fn insert_user(db: &SqliteDatabase, email: &str, name: &str, referred_by: Option<i64>) -> i64 {
    let (id,): (i64,) = sqlx::query_as("INSERT INTO users (email, name, referred_by) VALUES (?, ?, ?) RETURNING id")
        .bind(email)
        .bind(name)
        .bind(referred_by)
        .fetch_one(db.pool())
        .await
        .expect("Error inserting user");
    id
}

/// Inserts an event. It pays affiliate commission if `commission_bps` is given.
pub async fn insert_event(
    db: &SqliteDatabase,
    id: Option<i64>,
    title: &str,
    owner_id: i64,
    available_tickets: i64,
    commission_bps: Option<i64>,
) -> i64 {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO events (id, title, owner_id, available_tickets, is_affiliate, commission_bps) VALUES (?, ?, ?, \
         ?, ?, ?) RETURNING id",
    )
    .bind(id)
    .bind(title)
    .bind(owner_id)
    .bind(available_tickets)
    .bind(commission_bps.is_some())
    .bind(commission_bps)
    .fetch_one(db.pool())
    .await
    .expect("Error inserting event");
    id
}

pub async fn insert_movie(
    db: &SqliteDatabase,
    id: Option<i64>,
    title: &str,
    owner_id: i64,
    commission_bps: Option<i64>,
) -> i64 {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO movies (id, title, owner_id, is_affiliate, commission_bps) VALUES (?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(id)
    .bind(title)
    .bind(owner_id)
    .bind(commission_bps.is_some())
    .bind(commission_bps)
    .fetch_one(db.pool())
    .await
    .expect("Error inserting movie");
    id
}

/// Inserts an event whose owner does not exist, so that crediting the creator fails part way through a settlement.
pub async fn insert_orphan_event(db: &SqliteDatabase, title: &str, available_tickets: i64) -> i64 {
    let mut conn = db.pool().acquire().await.expect("Error acquiring connection");
    sqlx::query("PRAGMA foreign_keys = OFF").execute(&mut *conn).await.expect("Error disabling foreign keys");
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO events (title, owner_id, available_tickets, is_affiliate) VALUES (?, 999999, ?, FALSE) \
         RETURNING id",
    )
    .bind(title)
    .bind(available_tickets)
    .fetch_one(&mut *conn)
    .await
    .expect("Error inserting orphan event");
    sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await.expect("Error enabling foreign keys");
    id
}

/// The seeded marketplace used by most tests.
#[derive(Debug, Clone, Copy)]
pub struct Marketplace {
    pub creator_id: i64,
    pub affiliate_id: i64,
    /// Referred by the affiliate.
    pub buyer_id: i64,
    /// Event 5: one ticket left, 10% affiliate commission.
    pub event_id: i64,
    /// Movie 7: 15% affiliate commission.
    pub movie_id: i64,
}

pub const CREATOR_EMAIL: &str = "creator@example.com";
pub const AFFILIATE_EMAIL: &str = "affiliate@example.com";
pub const BUYER_EMAIL: &str = "alice@example.com";

pub async fn seed_marketplace(db: &SqliteDatabase) -> Marketplace {
    let creator_id = insert_user(db, CREATOR_EMAIL, "Cass Creator", None).await;
    let affiliate_id = insert_user(db, AFFILIATE_EMAIL, "Aff Iliate", None).await;
    let buyer_id = insert_user(db, BUYER_EMAIL, "Alice", Some(affiliate_id)).await;
    let event_id = insert_event(db, Some(5), "Weekend in Taipei", creator_id, 1, Some(1000)).await;
    let movie_id = insert_movie(db, Some(7), "Night Market", creator_id, Some(1500)).await;
    Marketplace { creator_id, affiliate_id, buyer_id, event_id, movie_id }
}

/// A gateway callback signed with the production test secret.
pub fn signed_webhook(transaction_id: &str, order_id: &str, amount: &str, email: &str, status: &str) -> WebhookFields {
    let mut fields = WebhookFields {
        amount: amount.to_string(),
        currency: "MYR".to_string(),
        product_description: format!("Order {order_id}"),
        order_id: order_id.to_string(),
        customer_order_id: String::new(),
        customer_name: "Alice".to_string(),
        customer_email: email.to_string(),
        customer_phone: "0123456789".to_string(),
        transaction_id: transaction_id.to_string(),
        status: status.to_string(),
        hash: String::new(),
        channel: "FPX".to_string(),
    };
    sign_webhook(&mut fields, SecretVariant::Production);
    fields
}

pub fn sign_webhook(fields: &mut WebhookFields, variant: SecretVariant) {
    fields.hash = test_secrets().sign(&fields.hashed_fields(), variant).expect("Test secret is not configured");
}

/// A gateway export in CSV form, with the standard header.
pub fn export_csv(rows: &[[&str; 8]]) -> Vec<u8> {
    let mut out = String::from("Transaction ID,Order ID,Customer(s),Amount,Status,Method,Merchant Email,Date\n");
    for row in rows {
        let quoted = row.iter().map(|c| format!("\"{}\"", c.replace('"', "\"\""))).collect::<Vec<_>>();
        out.push_str(&quoted.join(","));
        out.push('\n');
    }
    out.into_bytes()
}
