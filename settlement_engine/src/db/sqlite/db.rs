use std::{collections::HashSet, fmt::Debug, future::Future, time::Duration};

use log::*;
use sqlx::{migrate, SqlitePool};

use super::{
    catalog,
    db_url,
    new_pool,
    payments,
    purchases,
    revenue,
    settlement::{reverse_within, settle_within, BuyerPolicy, SettleStep},
    SqliteDatabaseError,
    UnitOfWork,
};
use crate::{
    db::traits::{LedgerQueries, Prefetched, SettlementDatabase, SettlementError, TransientDatabaseError},
    db_types::{Event, Movie, Payment, ReversalKind, Ticket, TransactionRevenue, User, VideoEntitlement},
    settlement_objects::{
        BatchOutcome,
        ExecutionStrategy,
        RecordSkip,
        ReversalOutcome,
        SettlementOutcome,
        SettlementRequest,
        SkipReason,
        TxOptions,
    },
};

const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `STL_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let url = db_url();
        SqliteDatabase::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        SqliteDatabase::new_with_options(url, max_connections, DEFAULT_ACQUIRE_TIMEOUT).await
    }

    pub async fn new_with_options(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, SqliteDatabaseError> {
        let pool = new_pool(url, max_connections, acquire_timeout).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<(), SqliteDatabaseError> {
        migrate!("./src/db/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    async fn prefetch(&self, request: &SettlementRequest) -> Result<Prefetched, SqliteDatabaseError> {
        let item = async {
            let mut conn = self.pool.acquire().await?;
            catalog::fetch_item(request.target, &mut conn).await
        };
        let buyer = async {
            let mut conn = self.pool.acquire().await?;
            catalog::fetch_user_by_email(&request.record.customer_email, &mut conn).await
        };
        let (item, buyer) = tokio::try_join!(item, buyer)?;
        Ok(Prefetched { item, buyer })
    }

    async fn settle_once(
        &self,
        request: &SettlementRequest,
        options: &TxOptions,
    ) -> Result<SettlementOutcome, SettlementError> {
        let prefetched = match options.strategy {
            ExecutionStrategy::Parallel => Some(self.prefetch(request).await?),
            ExecutionStrategy::Sequential => None,
        };
        let mut uow = UnitOfWork::begin(&self.pool, options).await?;
        match settle_within(&mut uow, request, prefetched, BuyerPolicy::AllowUnlinked).await {
            Ok(SettleStep::Settled(receipt)) => {
                uow.commit().await?;
                info!("🧾️ Transaction {} settled", receipt.transaction_id());
                Ok(SettlementOutcome::Settled(receipt))
            },
            Ok(SettleStep::AlreadyProcessed(payment)) => {
                uow.rollback().await?;
                Ok(SettlementOutcome::AlreadyProcessed(payment))
            },
            Err(e) => {
                if let Err(rb) = uow.rollback().await {
                    warn!("🧾️ Rollback after failed settlement also failed: {rb}");
                }
                Err(e)
            },
        }
    }

    async fn settle_batch_once(
        &self,
        requests: &[SettlementRequest],
        options: &TxOptions,
    ) -> Result<BatchOutcome, SettlementError> {
        let mut uow = UnitOfWork::begin(&self.pool, options).await?;
        let mut outcome = BatchOutcome::default();
        for request in requests {
            let mut savepoint = uow.savepoint().await?;
            let skip = |reason: SkipReason, detail: String| RecordSkip {
                transaction_id: request.record.transaction_id.clone(),
                order_id: request.record.order_id.clone(),
                customer_email: request.record.customer_email.clone(),
                reason,
                detail,
            };
            match settle_within(&mut savepoint, request, None, BuyerPolicy::Required).await {
                Ok(SettleStep::Settled(receipt)) => {
                    savepoint.commit().await?;
                    outcome.settled.push(receipt);
                },
                Ok(SettleStep::AlreadyProcessed(_)) => {
                    savepoint.rollback().await?;
                    outcome.skipped.push(skip(SkipReason::AlreadyProcessed, "already settled".into()));
                },
                Err(e) if e.is_record_level() => {
                    savepoint.rollback().await?;
                    info!("♻️ Skipping {}: {e}", request.record.transaction_id);
                    let reason = match e {
                        SettlementError::InventoryExhausted(_) => SkipReason::InventoryExhausted,
                        SettlementError::ItemNotFound { .. } => SkipReason::EventNotFound,
                        SettlementError::BuyerNotFound(_) => SkipReason::BuyerNotFound,
                        SettlementError::BeneficiaryNotFound(_) => SkipReason::BeneficiaryNotFound,
                        _ => SkipReason::InvalidRecord,
                    };
                    outcome.skipped.push(skip(reason, e.to_string()));
                },
                Err(e) => return Err(e),
            }
        }
        uow.commit().await?;
        Ok(outcome)
    }

    async fn reverse_once(
        &self,
        transaction_id: &str,
        kind: ReversalKind,
        options: &TxOptions,
    ) -> Result<ReversalOutcome, SettlementError> {
        let mut uow = UnitOfWork::begin(&self.pool, options).await?;
        let outcome = reverse_within(&mut uow, transaction_id, kind).await?;
        match &outcome {
            ReversalOutcome::Reversed(_) => uow.commit().await?,
            ReversalOutcome::AlreadyReversed(_) => uow.rollback().await?,
        }
        Ok(outcome)
    }
}

/// Runs a unit of work under its execution timeout. An expired unit of work is dropped, which rolls it back.
async fn with_timeout<T, F>(options: &TxOptions, fut: F) -> Result<T, SettlementError>
where F: Future<Output = Result<T, SettlementError>> {
    match tokio::time::timeout(options.execution_timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!("🗃️ Unit of work exceeded its {}s execution timeout", options.execution_timeout.as_secs_f32());
            Err(TransientDatabaseError::Timeout.into())
        },
    }
}

impl SettlementDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn settle_payment(
        &self,
        request: &SettlementRequest,
        options: &TxOptions,
    ) -> Result<SettlementOutcome, SettlementError> {
        with_timeout(options, self.settle_once(request, options)).await
    }

    async fn settle_recovery_batch(
        &self,
        requests: &[SettlementRequest],
        options: &TxOptions,
    ) -> Result<BatchOutcome, SettlementError> {
        with_timeout(options, self.settle_batch_once(requests, options)).await
    }

    async fn existing_transaction_ids(&self, transaction_ids: &[String]) -> Result<HashSet<String>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::existing_transaction_ids(transaction_ids, &mut conn).await?)
    }

    async fn reverse_settlement(
        &self,
        transaction_id: &str,
        kind: ReversalKind,
        options: &TxOptions,
    ) -> Result<ReversalOutcome, SettlementError> {
        with_timeout(options, self.reverse_once(transaction_id, kind, options)).await
    }

    async fn close(&mut self) -> Result<(), SettlementError> {
        self.pool.close().await;
        Ok(())
    }
}

impl LedgerQueries for SqliteDatabase {
    async fn fetch_payment(&self, transaction_id: &str) -> Result<Option<Payment>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_payment(transaction_id, &mut conn).await?)
    }

    async fn fetch_event(&self, event_id: i64) -> Result<Option<Event>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        Ok(catalog::fetch_event(event_id, &mut conn).await?)
    }

    async fn fetch_movie(&self, movie_id: i64) -> Result<Option<Movie>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        Ok(catalog::fetch_movie(movie_id, &mut conn).await?)
    }

    async fn fetch_user(&self, user_id: i64) -> Result<Option<User>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        Ok(catalog::fetch_user(user_id, &mut conn).await?)
    }

    async fn fetch_user_by_email(&self, email: &str) -> Result<Option<User>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        Ok(catalog::fetch_user_by_email(email, &mut conn).await?)
    }

    async fn fetch_tickets_for_event(&self, event_id: i64) -> Result<Vec<Ticket>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        Ok(purchases::fetch_tickets_for_event(event_id, &mut conn).await?)
    }

    async fn fetch_entitlements_for_movie(&self, movie_id: i64) -> Result<Vec<VideoEntitlement>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        Ok(purchases::fetch_entitlements_for_movie(movie_id, &mut conn).await?)
    }

    async fn fetch_revenue_for_transaction(&self, transaction_id: &str) -> Result<TransactionRevenue, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        revenue::fetch_for_transaction(transaction_id, &mut conn).await
    }
}
