#![allow(dead_code)]
use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
        Mutex,
    },
    time::Duration,
};

use settlement_engine::{
    db_types::{Event, Money, Movie, Payment, ReversalKind, Ticket, TransactionRevenue, User, VideoEntitlement},
    settlement_objects::{BatchOutcome, ReversalOutcome, SettlementOutcome, SettlementRequest, TxOptions},
    test_utils::{
        fixtures::{seed_marketplace, test_secrets, Marketplace},
        prepare_env::{prepare_test_env, random_db_path},
    },
    LedgerQueries,
    NotificationQueue,
    SettlementApi,
    SettlementDatabase,
    SettlementError,
    SqliteDatabase,
    TransientDatabaseError,
};

pub struct TestSystem {
    pub db: SqliteDatabase,
    pub queue: NotificationQueue,
    pub market: Marketplace,
}

impl TestSystem {
    pub async fn new() -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
        let market = seed_marketplace(&db).await;
        Self { db, queue: NotificationQueue::default(), market }
    }

    pub fn settlement_api(&self) -> SettlementApi<SqliteDatabase> {
        SettlementApi::new(self.db.clone(), self.queue.clone(), test_secrets())
    }

    pub async fn user(&self, id: i64) -> User {
        self.db.fetch_user(id).await.expect("Error fetching user").expect("User does not exist")
    }

    pub async fn total_revenue(&self, id: i64) -> Money {
        self.user(id).await.total_revenue
    }

    pub async fn event(&self, id: i64) -> Event {
        self.db.fetch_event(id).await.expect("Error fetching event").expect("Event does not exist")
    }
}

/// Wraps the test database, recording the size and timeout of every recovery batch it is handed. The first
/// `busy_batches` batches fail as if the database were locked.
#[derive(Clone)]
pub struct RecordingLedger {
    db: SqliteDatabase,
    busy_batches: Arc<AtomicUsize>,
    batches: Arc<Mutex<Vec<(usize, Duration)>>>,
}

impl RecordingLedger {
    pub fn new(db: SqliteDatabase, busy_batches: usize) -> Self {
        Self { db, busy_batches: Arc::new(AtomicUsize::new(busy_batches)), batches: Arc::default() }
    }

    /// `(records, execution timeout)` for every batch attempt, sorted.
    pub fn batches(&self) -> Vec<(usize, Duration)> {
        let mut batches = self.batches.lock().unwrap().clone();
        batches.sort();
        batches
    }
}

impl LedgerQueries for RecordingLedger {
    async fn fetch_payment(&self, transaction_id: &str) -> Result<Option<Payment>, SettlementError> {
        self.db.fetch_payment(transaction_id).await
    }

    async fn fetch_event(&self, event_id: i64) -> Result<Option<Event>, SettlementError> {
        self.db.fetch_event(event_id).await
    }

    async fn fetch_movie(&self, movie_id: i64) -> Result<Option<Movie>, SettlementError> {
        self.db.fetch_movie(movie_id).await
    }

    async fn fetch_user(&self, user_id: i64) -> Result<Option<User>, SettlementError> {
        self.db.fetch_user(user_id).await
    }

    async fn fetch_user_by_email(&self, email: &str) -> Result<Option<User>, SettlementError> {
        self.db.fetch_user_by_email(email).await
    }

    async fn fetch_tickets_for_event(&self, event_id: i64) -> Result<Vec<Ticket>, SettlementError> {
        self.db.fetch_tickets_for_event(event_id).await
    }

    async fn fetch_entitlements_for_movie(&self, movie_id: i64) -> Result<Vec<VideoEntitlement>, SettlementError> {
        self.db.fetch_entitlements_for_movie(movie_id).await
    }

    async fn fetch_revenue_for_transaction(&self, transaction_id: &str) -> Result<TransactionRevenue, SettlementError> {
        self.db.fetch_revenue_for_transaction(transaction_id).await
    }
}

impl SettlementDatabase for RecordingLedger {
    fn url(&self) -> &str {
        self.db.url()
    }

    async fn settle_payment(
        &self,
        request: &SettlementRequest,
        options: &TxOptions,
    ) -> Result<SettlementOutcome, SettlementError> {
        self.db.settle_payment(request, options).await
    }

    async fn settle_recovery_batch(
        &self,
        requests: &[SettlementRequest],
        options: &TxOptions,
    ) -> Result<BatchOutcome, SettlementError> {
        self.batches.lock().unwrap().push((requests.len(), options.execution_timeout));
        let busy = self.busy_batches.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok();
        if busy {
            return Err(TransientDatabaseError::Busy("database is locked".to_string()).into());
        }
        self.db.settle_recovery_batch(requests, options).await
    }

    async fn existing_transaction_ids(&self, transaction_ids: &[String]) -> Result<HashSet<String>, SettlementError> {
        self.db.existing_transaction_ids(transaction_ids).await
    }

    async fn reverse_settlement(
        &self,
        transaction_id: &str,
        kind: ReversalKind,
        options: &TxOptions,
    ) -> Result<ReversalOutcome, SettlementError> {
        self.db.reverse_settlement(transaction_id, kind, options).await
    }
}
