//! # Settlement server
//! This module hosts the HTTP surface of the settlement engine. It is responsible for:
//! Receiving signed payment callbacks from the gateway and handing them to the engine for settlement.
//! Exposing operator endpoints for refunds, payment lookups and the recovery of payments whose callbacks never
//! arrived.
//! Running the background worker that delivers customer notifications.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/gateway/webhook`: The gateway's form-encoded payment callback.
//! * `/api/refunds/{transaction_id}`: Refund a settled transaction.
//! * `/api/payments/{transaction_id}`: Look up a payment and the revenue it produced.
//! * `/api/recovery/{preview,run,export}`: Reconcile a gateway transaction export against the ledger.
//! * `/api/notifications`: Notification queue counters.
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;

pub mod helpers;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
