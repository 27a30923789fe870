use log::*;
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{EntitlementStatus, NewTicket, Ticket, TicketStatus, VideoEntitlement},
    helpers::{new_ticket_code, qr_payload},
};

const TICKET_COLUMNS: &str =
    "id, ticket_code, qr_payload, event_id, user_id, buyer_email, status, created_at, updated_at";
const ENTITLEMENT_COLUMNS: &str = "id, movie_id, user_id, buyer_email, status, created_at, updated_at";
const MAX_CODE_ATTEMPTS: usize = 5;

/// Inserts a ticket. Returns `None` if the ticket code is already taken.
pub async fn insert_ticket(ticket: &NewTicket, conn: &mut SqliteConnection) -> Result<Option<Ticket>, SqliteDatabaseError> {
    match sqlx::query_as(&format!(
        "INSERT INTO tickets (ticket_code, qr_payload, event_id, user_id, buyer_email, status) VALUES (?, ?, ?, ?, ?, \
         ?) RETURNING {TICKET_COLUMNS}"
    ))
    .bind(&ticket.ticket_code)
    .bind(&ticket.qr_payload)
    .bind(ticket.event_id)
    .bind(ticket.user_id)
    .bind(&ticket.buyer_email)
    .bind(TicketStatus::Active)
    .fetch_one(conn)
    .await
    {
        Ok(ticket) => Ok(Some(ticket)),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(None),
        Err(e) => Err(SqliteDatabaseError::from(e)),
    }
}

/// Issues a ticket with a fresh code, drawing a new code if the first one collides.
pub async fn issue_ticket(
    event_id: i64,
    user_id: Option<i64>,
    buyer_email: &str,
    transaction_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Ticket, SqliteDatabaseError> {
    for _ in 0..MAX_CODE_ATTEMPTS {
        let ticket_code = new_ticket_code();
        let ticket = NewTicket {
            qr_payload: qr_payload(&ticket_code, event_id, transaction_id),
            ticket_code,
            event_id,
            user_id,
            buyer_email: buyer_email.to_string(),
        };
        match insert_ticket(&ticket, &mut *conn).await? {
            Some(ticket) => return Ok(ticket),
            None => warn!("🗃️ Ticket code {} is already in use. Drawing another.", ticket.ticket_code),
        }
    }
    Err(SqliteDatabaseError::QueryError(format!("Could not find a free ticket code in {MAX_CODE_ATTEMPTS} attempts")))
}

pub async fn insert_entitlement(
    movie_id: i64,
    user_id: i64,
    buyer_email: &str,
    conn: &mut SqliteConnection,
) -> Result<VideoEntitlement, SqliteDatabaseError> {
    let entitlement = sqlx::query_as(&format!(
        "INSERT INTO video_entitlements (movie_id, user_id, buyer_email, status) VALUES (?, ?, ?, ?) RETURNING \
         {ENTITLEMENT_COLUMNS}"
    ))
    .bind(movie_id)
    .bind(user_id)
    .bind(buyer_email)
    .bind(EntitlementStatus::Active)
    .fetch_one(conn)
    .await?;
    Ok(entitlement)
}

pub async fn fetch_ticket(id: i64, conn: &mut SqliteConnection) -> Result<Option<Ticket>, SqliteDatabaseError> {
    let ticket = sqlx::query_as(&format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = ?"))
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(ticket)
}

pub async fn fetch_entitlement(
    id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<VideoEntitlement>, SqliteDatabaseError> {
    let entitlement = sqlx::query_as(&format!("SELECT {ENTITLEMENT_COLUMNS} FROM video_entitlements WHERE id = ?"))
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(entitlement)
}

pub async fn fetch_tickets_for_event(
    event_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Ticket>, SqliteDatabaseError> {
    let tickets = sqlx::query_as(&format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE event_id = ? ORDER BY id"))
        .bind(event_id)
        .fetch_all(conn)
        .await?;
    Ok(tickets)
}

pub async fn fetch_entitlements_for_movie(
    movie_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<VideoEntitlement>, SqliteDatabaseError> {
    let entitlements =
        sqlx::query_as(&format!("SELECT {ENTITLEMENT_COLUMNS} FROM video_entitlements WHERE movie_id = ? ORDER BY id"))
            .bind(movie_id)
            .fetch_all(conn)
            .await?;
    Ok(entitlements)
}

pub async fn update_ticket_status(
    id: i64,
    status: TicketStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Ticket>, SqliteDatabaseError> {
    let ticket = sqlx::query_as(&format!(
        "UPDATE tickets SET status = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ? RETURNING {TICKET_COLUMNS}"
    ))
    .bind(status)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(ticket)
}

pub async fn update_entitlement_status(
    id: i64,
    status: EntitlementStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<VideoEntitlement>, SqliteDatabaseError> {
    let entitlement = sqlx::query_as(&format!(
        "UPDATE video_entitlements SET status = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ? RETURNING \
         {ENTITLEMENT_COLUMNS}"
    ))
    .bind(status)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(entitlement)
}
