use crate::db_types::{SaleItem, User};

pub enum InsertPaymentResult {
    /// The row id of the new payment.
    Inserted(i64),
    /// The transaction id that was already on record.
    AlreadyExists(String),
}

/// Item and buyer, read ahead of the unit of work when lookups run in parallel.
#[derive(Debug, Clone, Default)]
pub struct Prefetched {
    pub item: Option<SaleItem>,
    pub buyer: Option<User>,
}
