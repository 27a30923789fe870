use crate::{
    db::traits::SettlementError,
    db_types::{Event, Movie, Payment, Ticket, TransactionRevenue, User, VideoEntitlement},
};

/// Read-only queries over the settlement ledger.
#[allow(async_fn_in_trait)]
pub trait LedgerQueries {
    /// Fetches the payment recorded for the given gateway transaction id, if any.
    async fn fetch_payment(&self, transaction_id: &str) -> Result<Option<Payment>, SettlementError>;

    async fn fetch_event(&self, event_id: i64) -> Result<Option<Event>, SettlementError>;

    async fn fetch_movie(&self, movie_id: i64) -> Result<Option<Movie>, SettlementError>;

    async fn fetch_user(&self, user_id: i64) -> Result<Option<User>, SettlementError>;

    /// E-mail matching is case-insensitive.
    async fn fetch_user_by_email(&self, email: &str) -> Result<Option<User>, SettlementError>;

    async fn fetch_tickets_for_event(&self, event_id: i64) -> Result<Vec<Ticket>, SettlementError>;

    async fn fetch_entitlements_for_movie(&self, movie_id: i64) -> Result<Vec<VideoEntitlement>, SettlementError>;

    /// Fetches every creator and affiliate revenue entry, active or refunded, for the given transaction.
    async fn fetch_revenue_for_transaction(&self, transaction_id: &str) -> Result<TransactionRevenue, SettlementError>;
}
