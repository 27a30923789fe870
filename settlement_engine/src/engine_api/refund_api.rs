use std::fmt::Debug;

use log::*;

use crate::{
    db::traits::{SettlementDatabase, SettlementError},
    db_types::{PaymentStatus, ReversalKind},
    notifications::{Notification, NotificationQueue},
    records::PaymentRecord,
    settlement_objects::{ReversalOutcome, ReversalReceipt, TxOptions},
};

/// `RefundApi` takes settled payments back out of the ledger, either because the merchant refunded the buyer or
/// because the gateway later reported the transaction as failed.
#[derive(Clone)]
pub struct RefundApi<B> {
    db: B,
    queue: NotificationQueue,
    options: TxOptions,
}

impl<B> Debug for RefundApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RefundApi")
    }
}

impl<B> RefundApi<B> {
    pub fn new(db: B, queue: NotificationQueue) -> Self {
        Self { db, queue, options: TxOptions::default() }
    }

    pub fn with_options(mut self, options: TxOptions) -> Self {
        self.options = options;
        self
    }
}

impl<B> RefundApi<B>
where B: SettlementDatabase
{
    /// Refunds a settled transaction. The buyer is told that the refund has started.
    ///
    /// Refunding a transaction that is no longer `completed` changes nothing and returns
    /// [`ReversalOutcome::AlreadyReversed`].
    pub async fn refund(&self, transaction_id: &str) -> Result<ReversalOutcome, SettlementError> {
        trace!("🧾️ Refund requested for {transaction_id}");
        let outcome = self.db.reverse_settlement(transaction_id, ReversalKind::Refunded, &self.options).await?;
        match &outcome {
            ReversalOutcome::Reversed(receipt) => match Notification::refund_initiated(receipt) {
                Some(n) => {
                    self.queue.enqueue(n);
                },
                None => warn!("🧾️ Refund of {transaction_id} has no purchase on record, so no buyer was notified"),
            },
            ReversalOutcome::AlreadyReversed(p) => {
                info!("🧾️ Refund of {transaction_id} ignored. The payment is already {}.", p.status)
            },
        }
        Ok(outcome)
    }

    /// Handles a gateway report that a transaction failed.
    ///
    /// If the transaction had already been settled, the settlement is reversed and the receipt returned. If it was
    /// never seen, nothing is written. Either way the buyer is told that the payment did not go through, unless the
    /// failure had already been recorded.
    pub async fn record_gateway_failure(
        &self,
        record: &PaymentRecord,
    ) -> Result<Option<ReversalReceipt>, SettlementError> {
        let tx_id = record.transaction_id.as_str();
        let existing = self.db.fetch_payment(tx_id).await?;
        let reversed = match existing {
            None => {
                info!("🧾️ Gateway reports {tx_id} ({}) as failed. No payment was settled.", record.order_id);
                None
            },
            Some(p) if p.status == PaymentStatus::Completed => {
                warn!("🧾️ Gateway reports settled transaction {tx_id} as failed. Reversing the settlement.");
                match self.db.reverse_settlement(tx_id, ReversalKind::Failed, &self.options).await? {
                    ReversalOutcome::Reversed(receipt) => Some(receipt),
                    // Lost a race with another reversal
                    ReversalOutcome::AlreadyReversed(_) => return Ok(None),
                }
            },
            Some(p) => {
                debug!("🧾️ Failure of {tx_id} already recorded. Payment is {}.", p.status);
                return Ok(None);
            },
        };
        self.queue.enqueue(Notification::payment_failed(record));
        Ok(reversed)
    }
}
