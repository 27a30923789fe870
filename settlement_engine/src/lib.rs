//! Settlement Engine
//!
//! The settlement engine turns payment gateway reports into durable business state, exactly once per gateway
//! transaction: a ticket or video purchase for the buyer, an updated ticket inventory, and revenue credited to the
//! item's creator and, where the buyer was referred, to an affiliate.
//!
//! The library is divided into these sections:
//! 1. Database management and control ([`mod@db`]). SQLite is the supported backend. You should never need to access
//!    the database directly. Instead, use the public API provided by the engine. The exception is the data types used
//!    in the database. These are defined in the `db_types` module and are public.
//! 2. The engine public API ([`SettlementApi`], [`RefundApi`], [`RecoveryApi`]). Backends implement
//!    [`SettlementDatabase`] and [`LedgerQueries`] in order to serve these APIs.
//! 3. Gateway data handling: signature verification and order id parsing in [`helpers`], and normalisation of
//!    callbacks and transaction exports in [`records`].
//! 4. Customer [`notifications`], queued after each committed state change and delivered by a background worker.
mod db;

pub mod db_types;
mod engine_api;
pub mod helpers;
pub mod notifications;
pub mod records;
pub mod retry;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::{SqliteDatabase, SqliteDatabaseError};
pub use db::traits::{
    InsertPaymentResult,
    LedgerQueries,
    Prefetched,
    SettlementDatabase,
    SettlementError,
    TransientDatabaseError,
};
pub use engine_api::{
    recovery_api::RecoveryApi,
    recovery_objects,
    refund_api::RefundApi,
    settlement_api::{SettlementApi, WebhookOutcome},
    settlement_objects,
};
pub use notifications::NotificationQueue;
