use std::collections::HashSet;

use mockall::mock;
use settlement_engine::{
    db_types::{Event, Movie, Payment, ReversalKind, Ticket, TransactionRevenue, User, VideoEntitlement},
    settlement_objects::{BatchOutcome, ReversalOutcome, SettlementOutcome, SettlementRequest, TxOptions},
    LedgerQueries,
    SettlementDatabase,
    SettlementError,
};

mock! {
    pub Ledger {}
    impl Clone for Ledger {
        fn clone(&self) -> Self;
    }
    impl LedgerQueries for Ledger {
        async fn fetch_payment(&self, transaction_id: &str) -> Result<Option<Payment>, SettlementError>;
        async fn fetch_event(&self, event_id: i64) -> Result<Option<Event>, SettlementError>;
        async fn fetch_movie(&self, movie_id: i64) -> Result<Option<Movie>, SettlementError>;
        async fn fetch_user(&self, user_id: i64) -> Result<Option<User>, SettlementError>;
        async fn fetch_user_by_email(&self, email: &str) -> Result<Option<User>, SettlementError>;
        async fn fetch_tickets_for_event(&self, event_id: i64) -> Result<Vec<Ticket>, SettlementError>;
        async fn fetch_entitlements_for_movie(&self, movie_id: i64) -> Result<Vec<VideoEntitlement>, SettlementError>;
        async fn fetch_revenue_for_transaction(&self, transaction_id: &str) -> Result<TransactionRevenue, SettlementError>;
    }
    impl SettlementDatabase for Ledger {
        fn url(&self) -> &str;
        async fn settle_payment(&self, request: &SettlementRequest, options: &TxOptions) -> Result<SettlementOutcome, SettlementError>;
        async fn settle_recovery_batch(&self, requests: &[SettlementRequest], options: &TxOptions) -> Result<BatchOutcome, SettlementError>;
        async fn existing_transaction_ids(&self, transaction_ids: &[String]) -> Result<HashSet<String>, SettlementError>;
        async fn reverse_settlement(&self, transaction_id: &str, kind: ReversalKind, options: &TxOptions) -> Result<ReversalOutcome, SettlementError>;
        async fn close(&mut self) -> Result<(), SettlementError>;
    }
}

/// Builds a mock ledger. Every clone handed out (the engine APIs clone their backend) gets the same expectations.
pub fn mock_ledger(setup: fn(&mut MockLedger)) -> MockLedger {
    let mut ledger = MockLedger::new();
    setup(&mut ledger);
    ledger.expect_clone().returning(move || mock_ledger(setup));
    ledger
}
