use std::{
    collections::{BTreeMap, HashMap},
    fmt::Debug,
};

use futures_util::{stream, StreamExt};
use log::*;

use crate::{
    db::traits::{SettlementDatabase, SettlementError},
    db_types::GatewayStatus,
    engine_api::recovery_objects::{FailedBatch, RecoveredRecord, RecoveryConfig, RecoveryReport, RecoveryResult},
    helpers::resolve_order_id,
    notifications::{Notification, NotificationQueue},
    records::{ExportRow, PaymentRecord},
    retry::retry_with_backoff,
    settlement_objects::{BatchOutcome, SettlementRequest},
};

const UNKNOWN_METHOD: &str = "Unknown";

struct RecoveryBatch {
    requests: Vec<SettlementRequest>,
    extended: bool,
}

impl RecoveryBatch {
    fn transaction_ids(&self) -> Vec<String> {
        self.requests.iter().map(|r| r.record.transaction_id.clone()).collect()
    }
}

/// `RecoveryApi` reconciles the gateway's transaction export against the ledger, settling event payments whose
/// callbacks never arrived.
///
/// Only the earliest event payment per buyer is ever settled automatically. Later ones are reported for manual
/// review, since a buyer paying twice is far more often a retry after a lost callback than a second purchase.
pub struct RecoveryApi<B> {
    db: B,
    queue: NotificationQueue,
    config: RecoveryConfig,
}

impl<B> Debug for RecoveryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RecoveryApi ({:?})", self.config)
    }
}

impl<B> RecoveryApi<B> {
    pub fn new(db: B, queue: NotificationQueue, config: RecoveryConfig) -> Self {
        Self { db, queue, config }
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }
}

impl<B> RecoveryApi<B>
where B: SettlementDatabase
{
    /// Classifies the export rows and reports what [`Self::recover`] would settle. Nothing is written.
    pub async fn preview(&self, rows: &[ExportRow]) -> Result<RecoveryReport, SettlementError> {
        let mut report = RecoveryReport { total_records: rows.len(), ..Default::default() };
        let mut event_records = Vec::new();
        for row in rows {
            match PaymentRecord::try_from_export_row(row) {
                Ok(record) if resolve_order_id(&record.order_id).is_event() => event_records.push(record),
                Ok(record) => report.non_event_records_list.push(record),
                Err(skip) => {
                    trace!("♻️ Row {} skipped: {}", skip.row, skip.reason);
                    report.skipped.push(skip);
                },
            }
        }
        report.event_records = event_records.len();
        report.non_event_records = report.non_event_records_list.len();
        report.skipped_rows = report.skipped.len();

        let mut by_email = HashMap::<String, Vec<PaymentRecord>>::new();
        for record in event_records {
            by_email.entry(record.email_key()).or_default().push(record);
        }
        report.unique_customers = by_email.len();
        let mut earliest = Vec::with_capacity(by_email.len());
        for (email, mut records) in by_email {
            // stable, so same-time records keep file order
            records.sort_by_key(|r| r.created_at);
            let mut records = records.into_iter();
            if let Some(first) = records.next() {
                earliest.push(first);
            }
            let later = records.collect::<Vec<_>>();
            if !later.is_empty() {
                debug!("♻️ {email} has {} later payments. Leaving them for manual review.", later.len());
                report.duplicate_payments_by_email.insert(email, later);
            }
        }
        report.duplicate_customers = report.duplicate_payments_by_email.len();

        let successful = earliest.into_iter().filter(|r| r.status == GatewayStatus::Success).collect::<Vec<_>>();
        report.success_records = successful.len();
        let ids = successful.iter().map(|r| r.transaction_id.clone()).collect::<Vec<_>>();
        let existing = self.db.existing_transaction_ids(&ids).await?;
        let mut to_recover =
            successful.into_iter().filter(|r| !existing.contains(&r.transaction_id)).collect::<Vec<_>>();
        to_recover.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.transaction_id.cmp(&b.transaction_id)));
        report.already_processed = report.success_records - to_recover.len();
        report.to_recover = to_recover.len();
        report.by_payment_method = count_by_method(&to_recover);
        report.records_to_recover = to_recover;
        info!(
            "♻️ Export has {} rows: {} event, {} other, {} unreadable. {} to recover, {} already processed, {} \
             customers with duplicates.",
            report.total_records,
            report.event_records,
            report.non_event_records,
            report.skipped_rows,
            report.to_recover,
            report.already_processed,
            report.duplicate_customers
        );
        Ok(report)
    }

    /// Settles every record [`Self::preview`] reports as recoverable.
    ///
    /// Records are settled in batches, each batch in a single unit of work, with up to `concurrency` batches in
    /// flight. A batch that fails for a transient reason is retried as a whole. Buyers of recovered tickets are
    /// notified once their batch has committed.
    pub async fn recover(&self, rows: &[ExportRow]) -> Result<RecoveryResult, SettlementError> {
        let report = self.preview(rows).await?;
        let batches = self.plan_batches(&report.records_to_recover);
        info!("♻️ Recovering {} records in {} batches", report.to_recover, batches.len());
        let outcomes = stream::iter(batches)
            .map(|batch| async move {
                let result = self.run_batch(&batch).await;
                (batch, result)
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect::<Vec<_>>()
            .await;

        let mut result = RecoveryResult { report, ..Default::default() };
        for (batch, outcome) in outcomes {
            match outcome {
                Ok(outcome) => self.record_batch(&batch, outcome, &mut result),
                Err(e) => {
                    error!("♻️ Batch of {} records failed. {e}", batch.requests.len());
                    result.failed += batch.requests.len();
                    result.failed_batches.push(FailedBatch {
                        transaction_ids: batch.transaction_ids(),
                        error: e.to_string(),
                        extended: batch.extended,
                    });
                },
            }
        }
        info!(
            "♻️ Recovery complete. {} settled, {} not settled, {} failed batches",
            result.processed,
            result.failed,
            result.failed_batches.len()
        );
        Ok(result)
    }

    fn plan_batches(&self, records: &[PaymentRecord]) -> Vec<RecoveryBatch> {
        let (extended, standard): (Vec<_>, Vec<_>) = records
            .iter()
            .filter_map(|r| match resolve_order_id(&r.order_id).target() {
                Some(target) => Some(SettlementRequest::new(r.clone(), target)),
                None => {
                    warn!("♻️ {} no longer resolves to an item. Skipping.", r.order_id);
                    None
                },
            })
            .partition(|req| self.config.is_extended_method(req.record.payment_method.as_deref()));
        let mut batches = Vec::new();
        for (requests, extended) in [(standard, false), (extended, true)] {
            for chunk in requests.chunks(self.config.batch_size(extended)) {
                batches.push(RecoveryBatch { requests: chunk.to_vec(), extended });
            }
        }
        batches
    }

    async fn run_batch(&self, batch: &RecoveryBatch) -> Result<BatchOutcome, SettlementError> {
        let options = self.config.tx_options.clone().with_execution_timeout(self.config.timeout(batch.extended));
        let db = &self.db;
        let requests = batch.requests.as_slice();
        let options = &options;
        retry_with_backoff(
            &self.config.retry,
            move || db.settle_recovery_batch(requests, options),
            SettlementError::is_retryable,
        )
        .await
    }

    fn record_batch(&self, batch: &RecoveryBatch, outcome: BatchOutcome, result: &mut RecoveryResult) {
        let records =
            batch.requests.iter().map(|r| (r.record.transaction_id.as_str(), &r.record)).collect::<HashMap<_, _>>();
        for receipt in outcome.settled {
            let Some(record) = records.get(receipt.transaction_id()) else {
                error!("♻️ Batch settled {} which it was never given", receipt.transaction_id());
                continue;
            };
            self.queue.enqueue(Notification::ticket_recovered(record, &receipt));
            result.processed += 1;
            *result.by_payment_method.entry(method_label(record)).or_default() += 1;
            result.recovered.push(RecoveredRecord {
                transaction_id: record.transaction_id.clone(),
                order_id: record.order_id.clone(),
                customer_email: record.customer_email.clone(),
                ticket_code: receipt.purchase.ticket_code().map(String::from),
            });
        }
        result.failed += outcome.skipped.len();
        result.skipped_during_recovery.extend(outcome.skipped);
    }
}

fn method_label(record: &PaymentRecord) -> String {
    record.payment_method.clone().unwrap_or_else(|| UNKNOWN_METHOD.to_string())
}

fn count_by_method(records: &[PaymentRecord]) -> BTreeMap<String, usize> {
    records.iter().fold(BTreeMap::new(), |mut acc, r| {
        *acc.entry(method_label(r)).or_default() += 1;
        acc
    })
}
