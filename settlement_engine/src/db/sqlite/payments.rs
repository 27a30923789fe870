use std::collections::HashSet;

use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db::{sqlite::SqliteDatabaseError, traits::InsertPaymentResult},
    db_types::{NewPayment, Payment, PaymentStatus, Purchase},
};

const PAYMENT_COLUMNS: &str = "id, transaction_id, order_id, amount, currency, payment_method, status, \
                               purchase_kind, ticket_id, entitlement_id, created_at, updated_at";

/// Inserts a payment. The unique transaction id makes this the idempotency check for settlement: a second insert for
/// the same transaction returns [`InsertPaymentResult::AlreadyExists`].
pub async fn idempotent_insert(
    payment: &NewPayment,
    conn: &mut SqliteConnection,
) -> Result<InsertPaymentResult, SqliteDatabaseError> {
    match sqlx::query_scalar(
        r#"
            INSERT INTO payments (transaction_id, order_id, amount, currency, payment_method, status, purchase_kind)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id;
        "#,
    )
    .bind(&payment.transaction_id)
    .bind(&payment.order_id)
    .bind(payment.amount)
    .bind(&payment.currency)
    .bind(&payment.payment_method)
    .bind(PaymentStatus::Completed)
    .bind(payment.purchase_kind)
    .fetch_one(conn)
    .await
    {
        Ok(id) => Ok(InsertPaymentResult::Inserted(id)),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Ok(InsertPaymentResult::AlreadyExists(payment.transaction_id.clone()))
        },
        Err(e) => Err(SqliteDatabaseError::from(e)),
    }
}

pub async fn fetch_payment(
    transaction_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, SqliteDatabaseError> {
    let payment = sqlx::query_as(&format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE transaction_id = ?"))
        .bind(transaction_id)
        .fetch_optional(conn)
        .await?;
    Ok(payment)
}

pub async fn link_purchase(
    payment_id: i64,
    purchase: &Purchase,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let (ticket_id, entitlement_id) = match purchase {
        Purchase::Ticket(t) => (Some(t.id), None),
        Purchase::Video(v) => (None, Some(v.id)),
    };
    sqlx::query("UPDATE payments SET ticket_id = ?, entitlement_id = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?")
        .bind(ticket_id)
        .bind(entitlement_id)
        .bind(payment_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Moves a `completed` payment to `status`. Returns `false` if the payment was no longer `completed`.
pub async fn close_completed_payment(
    transaction_id: &str,
    status: PaymentStatus,
    conn: &mut SqliteConnection,
) -> Result<bool, SqliteDatabaseError> {
    let result = sqlx::query(
        "UPDATE payments SET status = ?, updated_at = CURRENT_TIMESTAMP WHERE transaction_id = ? AND status = ?",
    )
    .bind(status)
    .bind(transaction_id)
    .bind(PaymentStatus::Completed)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn existing_transaction_ids(
    transaction_ids: &[String],
    conn: &mut SqliteConnection,
) -> Result<HashSet<String>, SqliteDatabaseError> {
    let mut found = HashSet::new();
    // Stay well under SQLite's bound-parameter limit
    for chunk in transaction_ids.chunks(500) {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT transaction_id FROM payments WHERE transaction_id IN (");
        let mut ids = builder.separated(", ");
        for id in chunk {
            ids.push_bind(id.clone());
        }
        ids.push_unseparated(")");
        let rows: Vec<String> = builder.build_query_scalar().fetch_all(&mut *conn).await?;
        found.extend(rows);
    }
    Ok(found)
}
