use std::time::Duration;

use serde::Serialize;

use crate::{
    db_types::{Money, Payment, Purchase, RevenueBeneficiary, RevenueEntry, ReversalKind, TransactionRevenue},
    helpers::OrderTarget,
    records::PaymentRecord,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum IsolationLevel {
    /// The minimum any backend must provide.
    #[default]
    ReadCommitted,
    Serializable,
}

/// How the item and buyer are looked up during settlement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ExecutionStrategy {
    /// Read concurrently on separate connections before the unit of work starts, keeping the write lock short.
    #[default]
    Parallel,
    /// Read one after the other inside the unit of work.
    Sequential,
}

/// Bounds and behaviour for a single unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOptions {
    /// How long to wait for a database connection.
    pub acquire_timeout: Duration,
    /// How long the whole unit of work may run before it is rolled back.
    pub execution_timeout: Duration,
    pub isolation: IsolationLevel,
    pub strategy: ExecutionStrategy,
}

impl Default for TxOptions {
    fn default() -> Self {
        Self {
            acquire_timeout: Duration::from_secs(20),
            execution_timeout: Duration::from_secs(60),
            isolation: IsolationLevel::default(),
            strategy: ExecutionStrategy::default(),
        }
    }
}

impl TxOptions {
    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = timeout;
        self
    }

    pub fn with_strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

/// A verified, normalised successful payment and the item it pays for.
#[derive(Debug, Clone)]
pub struct SettlementRequest {
    pub record: PaymentRecord,
    pub target: OrderTarget,
}

impl SettlementRequest {
    pub fn new(record: PaymentRecord, target: OrderTarget) -> Self {
        Self { record, target }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SettlementOutcome {
    Settled(SettlementReceipt),
    /// The transaction had already been settled. Nothing was changed.
    AlreadyProcessed(Payment),
}

/// Revenue credited to a beneficiary as part of a settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedRevenue {
    pub beneficiary: RevenueBeneficiary,
    pub beneficiary_id: i64,
    pub amount: Money,
    pub commission_bps: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettlementReceipt {
    pub payment: Payment,
    pub purchase: Purchase,
    pub item_title: String,
    /// `None` when a ticket was sold to someone without a user account.
    pub buyer_id: Option<i64>,
    pub revenue: Vec<AppliedRevenue>,
}

impl SettlementReceipt {
    pub fn transaction_id(&self) -> &str {
        &self.payment.transaction_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    AlreadyProcessed,
    InventoryExhausted,
    EventNotFound,
    BuyerNotFound,
    BeneficiaryNotFound,
    InvalidRecord,
}

/// A record in a recovery batch that was not settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSkip {
    pub transaction_id: String,
    pub order_id: String,
    pub customer_email: String,
    pub reason: SkipReason,
    pub detail: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchOutcome {
    pub settled: Vec<SettlementReceipt>,
    pub skipped: Vec<RecordSkip>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReversalReceipt {
    pub kind: ReversalKind,
    pub payment: Payment,
    pub purchase: Option<Purchase>,
    /// Revenue entries that moved from active to refunded.
    pub reversed_revenue: Vec<RevenueEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReversalOutcome {
    Reversed(ReversalReceipt),
    /// The payment was not `completed`, so there was nothing to reverse.
    AlreadyReversed(Payment),
}

/// A payment and the revenue it produced, for operator lookups.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentDetails {
    pub payment: Payment,
    pub revenue: TransactionRevenue,
}
