use std::fmt::Debug;

use log::*;
use serde::Serialize;

use crate::{
    db::traits::{SettlementDatabase, SettlementError},
    db_types::{GatewayStatus, Payment},
    engine_api::refund_api::RefundApi,
    helpers::{resolve_order_id, GatewaySecrets, SecretVariant},
    notifications::{Notification, NotificationQueue},
    records::{PaymentRecord, WebhookFields},
    settlement_objects::{
        PaymentDetails,
        ReversalReceipt,
        SettlementOutcome,
        SettlementReceipt,
        SettlementRequest,
        TxOptions,
    },
};

/// What became of a gateway callback.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WebhookOutcome {
    Settled(SettlementReceipt),
    AlreadyProcessed(Payment),
    /// The gateway reported a failed payment. `reversed` holds the reversal if the transaction had been settled.
    FailureRecorded { transaction_id: String, reversed: Option<ReversalReceipt> },
}

/// `SettlementApi` is the entry point for live gateway callbacks.
///
/// A callback is checked against the gateway signature before anything else is looked at, then normalised, resolved
/// to the item it pays for and settled in a single unit of work. Notifications are queued only after the unit of work
/// has committed.
#[derive(Clone)]
pub struct SettlementApi<B> {
    db: B,
    queue: NotificationQueue,
    secrets: GatewaySecrets,
    variant: SecretVariant,
    options: TxOptions,
    refunds: RefundApi<B>,
}

impl<B> Debug for SettlementApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettlementApi ({:?} secret)", self.variant)
    }
}

impl<B: Clone> SettlementApi<B> {
    pub fn new(db: B, queue: NotificationQueue, secrets: GatewaySecrets) -> Self {
        let refunds = RefundApi::new(db.clone(), queue.clone());
        Self { db, queue, secrets, variant: SecretVariant::default(), options: TxOptions::default(), refunds }
    }

    /// Selects which gateway secret callbacks are verified with.
    pub fn with_secret_variant(mut self, variant: SecretVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn with_options(mut self, options: TxOptions) -> Self {
        self.refunds = self.refunds.with_options(options.clone());
        self.options = options;
        self
    }

    pub fn options(&self) -> &TxOptions {
        &self.options
    }

    pub fn refunds(&self) -> &RefundApi<B> {
        &self.refunds
    }
}

impl<B> SettlementApi<B>
where B: SettlementDatabase
{
    /// Handles one gateway callback.
    ///
    /// Errors are returned for forged callbacks ([`SettlementError::Authenticity`]), malformed ones, order ids that
    /// do not name an item, and settlements that cannot go ahead (sold out, unknown item). A transaction that has
    /// been settled before is not an error; it returns [`WebhookOutcome::AlreadyProcessed`].
    pub async fn process_webhook(&self, fields: &WebhookFields) -> Result<WebhookOutcome, SettlementError> {
        self.secrets.verify_or_err(&fields.hashed_fields(), &fields.hash, self.variant)?;
        let record = PaymentRecord::try_from_webhook(fields)?;
        trace!("🧾️ Callback for {} ({}) is {}", record.transaction_id, record.order_id, record.status);
        match record.status {
            GatewayStatus::Failed => {
                let reversed = self.refunds.record_gateway_failure(&record).await?;
                Ok(WebhookOutcome::FailureRecorded { transaction_id: record.transaction_id, reversed })
            },
            GatewayStatus::Success => {
                let target = resolve_order_id(&record.order_id).require(&record.order_id)?;
                let outcome = self.settle(SettlementRequest::new(record, target)).await?;
                Ok(match outcome {
                    SettlementOutcome::Settled(receipt) => WebhookOutcome::Settled(receipt),
                    SettlementOutcome::AlreadyProcessed(payment) => WebhookOutcome::AlreadyProcessed(payment),
                })
            },
        }
    }

    /// Settles a verified, successful payment and queues the buyer's confirmation.
    pub async fn settle(&self, request: SettlementRequest) -> Result<SettlementOutcome, SettlementError> {
        let outcome = self.db.settle_payment(&request, &self.options).await?;
        match &outcome {
            SettlementOutcome::Settled(receipt) => {
                self.queue.enqueue(Notification::purchase_confirmation(&request.record, receipt));
            },
            SettlementOutcome::AlreadyProcessed(p) => {
                info!("🧾️ Transaction {} was already settled at {}. Ignoring.", p.transaction_id, p.created_at)
            },
        }
        Ok(outcome)
    }

    pub async fn payment_details(&self, transaction_id: &str) -> Result<PaymentDetails, SettlementError> {
        let payment = self
            .db
            .fetch_payment(transaction_id)
            .await?
            .ok_or_else(|| SettlementError::PaymentNotFound(transaction_id.to_string()))?;
        let revenue = self.db.fetch_revenue_for_transaction(transaction_id).await?;
        Ok(PaymentDetails { payment, revenue })
    }
}
