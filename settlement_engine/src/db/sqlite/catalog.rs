//! Events, movies and user accounts.
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{Event, ItemKind, Money, Movie, SaleItem, User},
    helpers::OrderTarget,
};

pub async fn fetch_event(id: i64, conn: &mut SqliteConnection) -> Result<Option<Event>, SqliteDatabaseError> {
    let event = sqlx::query_as(
        "SELECT id, title, owner_id, available_tickets, is_affiliate, commission_bps FROM events WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(event)
}

pub async fn fetch_movie(id: i64, conn: &mut SqliteConnection) -> Result<Option<Movie>, SqliteDatabaseError> {
    let movie =
        sqlx::query_as("SELECT id, title, owner_id, is_affiliate, commission_bps FROM movies WHERE id = ?")
            .bind(id)
            .fetch_optional(conn)
            .await?;
    Ok(movie)
}

pub async fn fetch_item(target: OrderTarget, conn: &mut SqliteConnection) -> Result<Option<SaleItem>, SqliteDatabaseError> {
    let item = match target.kind {
        ItemKind::Event => fetch_event(target.item_id, conn).await?.map(SaleItem::Event),
        ItemKind::Movie => fetch_movie(target.item_id, conn).await?.map(SaleItem::Movie),
    };
    Ok(item)
}

/// Takes one ticket from the event's allocation. Returns `false`, changing nothing, if none are left.
///
/// This conditional update is the only thing standing between concurrent buyers and an oversold event.
pub async fn take_ticket(event_id: i64, conn: &mut SqliteConnection) -> Result<bool, SqliteDatabaseError> {
    let result =
        sqlx::query("UPDATE events SET available_tickets = available_tickets - 1 WHERE id = ? AND available_tickets > 0")
            .bind(event_id)
            .execute(conn)
            .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn return_ticket(event_id: i64, conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    sqlx::query("UPDATE events SET available_tickets = available_tickets + 1 WHERE id = ?")
        .bind(event_id)
        .execute(conn)
        .await?;
    Ok(())
}

const USER_COLUMNS: &str = "id, email, name, total_revenue, referred_by, created_at, updated_at";

pub async fn fetch_user(id: i64, conn: &mut SqliteConnection) -> Result<Option<User>, SqliteDatabaseError> {
    let user = sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(user)
}

pub async fn fetch_user_by_email(email: &str, conn: &mut SqliteConnection) -> Result<Option<User>, SqliteDatabaseError> {
    let user = sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ? COLLATE NOCASE"))
        .bind(email.trim())
        .fetch_optional(conn)
        .await?;
    Ok(user)
}

/// Adds `delta` (which may be negative) to the user's running revenue total. Returns `false` if the user does not
/// exist.
pub async fn adjust_total_revenue(
    user_id: i64,
    delta: Money,
    conn: &mut SqliteConnection,
) -> Result<bool, SqliteDatabaseError> {
    let result = sqlx::query(
        "UPDATE users SET total_revenue = total_revenue + ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
    )
    .bind(delta)
    .bind(user_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}
