//! Normalisation of gateway payment data.
//!
//! Payments reach the engine in two shapes: a form-encoded webhook callback ([`WebhookFields`]) and rows from the
//! gateway's transaction export ([`ExportRow`]). Both are converted into a single [`PaymentRecord`] before anything
//! else happens.
mod export;
mod payment_record;

pub use export::{parse_export, write_export, ExportError, ExportFormat, ExportRow, EXPORT_COLUMNS};
pub use payment_record::{PaymentRecord, RowSkip, WebhookFields};
