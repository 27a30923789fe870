//! # Settlement engine public API
//!
//! * [`settlement_api`] handles live gateway callbacks: signature check, normalisation, order resolution and
//!   settlement.
//! * [`refund_api`] reverses settled payments, for merchant refunds and for late failure reports from the gateway.
//! * [`recovery_api`] reconciles a gateway transaction export against the ledger and settles payments whose
//!   callbacks were lost.
//!
//! Every API is created from a database backend implementing [`SettlementDatabase`] and a [`NotificationQueue`]:
//!
//! ```rust,ignore
//! use settlement_engine::{NotificationQueue, SettlementApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/settlement.db", 25).await?;
//! let queue = NotificationQueue::default();
//! let api = SettlementApi::new(db, queue, secrets);
//! let outcome = api.process_webhook(&fields).await?;
//! ```
//!
//! [`SettlementDatabase`]: crate::SettlementDatabase
//! [`NotificationQueue`]: crate::notifications::NotificationQueue
pub mod recovery_api;
pub mod recovery_objects;
pub mod refund_api;
pub mod settlement_api;
pub mod settlement_objects;
