use std::collections::HashSet;

use thiserror::Error;

use crate::{
    db::traits::LedgerQueries,
    db_types::{ItemKind, ReversalKind},
    settlement_objects::{BatchOutcome, ReversalOutcome, SettlementOutcome, SettlementRequest, TxOptions},
};

/// Database conditions that are expected to clear by themselves. Only these are retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransientDatabaseError {
    #[error("The unit of work did not complete within its execution timeout")]
    Timeout,
    #[error("No database connection became available in time")]
    PoolTimedOut,
    #[error("The database is busy: {0}")]
    Busy(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettlementError {
    #[error("The gateway signature is invalid")]
    Authenticity,
    #[error("Invalid payment record: {0}")]
    Validation(String),
    #[error("Order id '{0}' does not identify a purchasable item")]
    UnrecognizedOrderFormat(String),
    #[error("Event {0} has no tickets left")]
    InventoryExhausted(i64),
    #[error("{kind} {id} does not exist")]
    ItemNotFound { kind: ItemKind, id: i64 },
    #[error("No user account exists for buyer {0}")]
    BuyerNotFound(String),
    #[error("Revenue beneficiary {0} does not exist")]
    BeneficiaryNotFound(i64),
    #[error("No payment exists for transaction {0}")]
    PaymentNotFound(String),
    #[error("Transient database error: {0}")]
    Transient(#[from] TransientDatabaseError),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl SettlementError {
    /// Whether the failed operation may succeed if it is simply tried again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SettlementError::Transient(_))
    }

    /// Whether the error concerns a single payment record rather than the database as a whole. In a batch, such
    /// records are skipped and the rest of the batch carries on.
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            SettlementError::Validation(_)
                | SettlementError::UnrecognizedOrderFormat(_)
                | SettlementError::InventoryExhausted(_)
                | SettlementError::ItemNotFound { .. }
                | SettlementError::BuyerNotFound(_)
                | SettlementError::BeneficiaryNotFound(_)
        )
    }
}

/// The write side of the settlement ledger.
///
/// Implementations must guarantee that each method is atomic. In particular a payment, its purchase, the inventory
/// change and the revenue entries are always committed together or not at all.
#[allow(async_fn_in_trait)]
pub trait SettlementDatabase: Clone + LedgerQueries {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Settles a successful gateway payment, in a single unit of work:
    /// * reserves the transaction id by inserting the payment. If the transaction has been seen before, nothing
    ///   further is done and [`SettlementOutcome::AlreadyProcessed`] is returned.
    /// * decrements the event's ticket inventory and issues a ticket, or grants the video entitlement
    /// * links the purchase to the payment
    /// * credits the creator, and the buyer's referring affiliate if the item pays commission
    async fn settle_payment(
        &self,
        request: &SettlementRequest,
        options: &TxOptions,
    ) -> Result<SettlementOutcome, SettlementError>;

    /// Settles a batch of recovered payments in one unit of work. Each record is settled inside its own savepoint.
    /// Records that cannot be settled are rolled back individually and reported in [`BatchOutcome::skipped`]; the
    /// rest of the batch carries on. Any other error rolls back the whole batch.
    async fn settle_recovery_batch(
        &self,
        requests: &[SettlementRequest],
        options: &TxOptions,
    ) -> Result<BatchOutcome, SettlementError>;

    /// Returns the subset of the given transaction ids that already have a payment on record.
    async fn existing_transaction_ids(&self, transaction_ids: &[String]) -> Result<HashSet<String>, SettlementError>;

    /// Reverses a completed settlement: the payment and purchase move to their terminal status, the ticket is
    /// returned to inventory, and active revenue entries are marked refunded with the beneficiaries' running totals
    /// reduced to match. Reversing a payment that is not `completed` changes nothing.
    async fn reverse_settlement(
        &self,
        transaction_id: &str,
        kind: ReversalKind,
        options: &TxOptions,
    ) -> Result<ReversalOutcome, SettlementError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), SettlementError> {
        Ok(())
    }
}
