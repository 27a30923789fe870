//! # Database management and control.
//!
//! This module defines the interface contracts of the settlement engine database *backends*.
//!
//! * [`SettlementDatabase`] is the write side. Every method runs as a single unit of work: it either completes in
//!   full or leaves no trace. Settlement, batch recovery and reversal all live here.
//! * [`LedgerQueries`] provides read-only access to payments, purchases, catalogue items and the revenue ledger.
//!
//! All methods return [`SettlementError`], so that callers can tell transient database conditions (worth retrying)
//! apart from business rule outcomes like an exhausted ticket allocation.
mod data_objects;
mod ledger_queries;
mod settlement_database;

pub use data_objects::{InsertPaymentResult, Prefetched};
pub use ledger_queries::LedgerQueries;
pub use settlement_database::{SettlementDatabase, SettlementError, TransientDatabaseError};
