use rand::{distributions::Uniform, Rng};
use serde_json::json;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_LENGTH: usize = 10;

/// A fresh ticket code, `TKT-` followed by 10 random uppercase alphanumerics.
///
/// Uniqueness is enforced by the database. Callers retry on a collision.
pub fn new_ticket_code() -> String {
    let dist = Uniform::from(0..CODE_ALPHABET.len());
    let suffix: String =
        rand::thread_rng().sample_iter(dist).take(CODE_LENGTH).map(|i| char::from(CODE_ALPHABET[i])).collect();
    format!("TKT-{suffix}")
}

/// The payload encoded into a ticket's QR code at the door.
pub fn qr_payload(ticket_code: &str, event_id: i64, transaction_id: &str) -> String {
    json!({
        "ticketCode": ticket_code,
        "eventId": event_id,
        "transactionId": transaction_id,
    })
    .to_string()
}
