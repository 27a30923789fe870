use log::*;
use thiserror::Error;

use crate::db::traits::{SettlementError, TransientDatabaseError};

// SQLITE_BUSY and SQLITE_LOCKED, and their extended codes
const BUSY_CODES: [&str; 6] = ["5", "6", "261", "262", "517", "773"];

#[derive(Debug, Error)]
pub enum SqliteDatabaseError {
    #[error("Database connection error: {0}")]
    DriverError(#[from] sqlx::Error),
    #[error("Database query error: {0}")]
    QueryError(String),
    #[error("Timed out waiting for a database connection")]
    AcquireTimeout,
    #[error("Database migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
}

impl SqliteDatabaseError {
    fn is_busy(e: &sqlx::Error) -> bool {
        match e {
            sqlx::Error::Database(db) => {
                db.code().map(|c| BUSY_CODES.contains(&c.as_ref())).unwrap_or(false)
                    || db.message().contains("database is locked")
            },
            _ => false,
        }
    }
}

impl From<SqliteDatabaseError> for SettlementError {
    fn from(e: SqliteDatabaseError) -> Self {
        match e {
            SqliteDatabaseError::AcquireTimeout | SqliteDatabaseError::DriverError(sqlx::Error::PoolTimedOut) => {
                SettlementError::Transient(TransientDatabaseError::PoolTimedOut)
            },
            SqliteDatabaseError::DriverError(e) if SqliteDatabaseError::is_busy(&e) => {
                debug!("🗃️ Database is busy: {e}");
                SettlementError::Transient(TransientDatabaseError::Busy(e.to_string()))
            },
            e => SettlementError::DatabaseError(e.to_string()),
        }
    }
}

impl From<sqlx::Error> for SettlementError {
    fn from(e: sqlx::Error) -> Self {
        SqliteDatabaseError::from(e).into()
    }
}
