use std::{collections::BTreeMap, time::Duration};

use serde::Serialize;

use crate::{
    records::{PaymentRecord, RowSkip},
    retry::RetryPolicy,
    settlement_objects::{RecordSkip, TxOptions},
};

pub const DEFAULT_EXTENDED_METHODS: [&str; 5] = ["TNG", "Touch 'n Go", "e-wallet", "Boost", "GrabPay"];

/// Tuning for a recovery run.
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// How many batches may run at once.
    pub concurrency: usize,
    pub standard_batch_size: usize,
    pub extended_batch_size: usize,
    pub standard_timeout: Duration,
    pub extended_timeout: Duration,
    /// Payment methods that get smaller batches and the longer timeout. Matched ignoring case, spaces and
    /// punctuation.
    pub extended_methods: Vec<String>,
    pub retry: RetryPolicy,
    /// Base options for each batch's unit of work. The execution timeout is replaced per batch.
    pub tx_options: TxOptions,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            standard_batch_size: 20,
            extended_batch_size: 5,
            standard_timeout: Duration::from_secs(60),
            extended_timeout: Duration::from_secs(180),
            extended_methods: DEFAULT_EXTENDED_METHODS.iter().map(|s| s.to_string()).collect(),
            retry: RetryPolicy::default(),
            tx_options: TxOptions::default(),
        }
    }
}

impl RecoveryConfig {
    pub fn is_extended_method(&self, method: Option<&str>) -> bool {
        let Some(method) = method.map(method_key).filter(|m| !m.is_empty()) else {
            return false;
        };
        self.extended_methods.iter().map(|m| method_key(m)).filter(|m| !m.is_empty()).any(|m| method.contains(&m))
    }

    pub fn batch_size(&self, extended: bool) -> usize {
        let size = if extended { self.extended_batch_size } else { self.standard_batch_size };
        size.max(1)
    }

    pub fn timeout(&self, extended: bool) -> Duration {
        if extended {
            self.extended_timeout
        } else {
            self.standard_timeout
        }
    }
}

/// "Touch 'n Go eWallet" -> "touchngoewallet"
fn method_key(method: &str) -> String {
    method.chars().filter(char::is_ascii_alphanumeric).map(|c| c.to_ascii_lowercase()).collect()
}

/// What a recovery run would do with an export, without changing anything.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryReport {
    /// Data rows in the export.
    pub total_records: usize,
    /// Rows whose order id names an event.
    pub event_records: usize,
    pub non_event_records: usize,
    /// Rows that could not be read as a payment at all.
    pub skipped_rows: usize,
    /// Distinct buyer e-mails among the event records.
    pub unique_customers: usize,
    /// Buyers with more than one event record.
    pub duplicate_customers: usize,
    /// Earliest-per-buyer event records that the gateway marked successful.
    pub success_records: usize,
    /// Successful records that already have a payment on file.
    pub already_processed: usize,
    pub to_recover: usize,
    pub by_payment_method: BTreeMap<String, usize>,
    pub records_to_recover: Vec<PaymentRecord>,
    pub non_event_records_list: Vec<PaymentRecord>,
    /// Later records from buyers with several event records, keyed by lowercase e-mail. These are left for manual
    /// review and never settled automatically.
    pub duplicate_payments_by_email: BTreeMap<String, Vec<PaymentRecord>>,
    pub skipped: Vec<RowSkip>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveredRecord {
    pub transaction_id: String,
    pub order_id: String,
    pub customer_email: String,
    pub ticket_code: Option<String>,
}

/// A batch that was rolled back as a whole, after any retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedBatch {
    pub transaction_ids: Vec<String>,
    pub error: String,
    pub extended: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryResult {
    pub report: RecoveryReport,
    /// Records settled by this run.
    pub processed: usize,
    /// Records that were attempted but not settled, whether skipped or in a failed batch.
    pub failed: usize,
    /// Settled records per payment method.
    pub by_payment_method: BTreeMap<String, usize>,
    pub recovered: Vec<RecoveredRecord>,
    pub skipped_during_recovery: Vec<RecordSkip>,
    pub failed_batches: Vec<FailedBatch>,
}
