mod db;
mod errors;
mod unit_of_work;

pub mod catalog;
pub mod payments;
pub mod purchases;
pub mod revenue;
pub mod settlement;

use std::{env, str::FromStr, time::Duration};

pub use db::SqliteDatabase;
pub use errors::SqliteDatabaseError;
use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
pub use unit_of_work::UnitOfWork;

const SQLITE_DB_URL: &str = "sqlite://data/settlement.db";

pub fn db_url() -> String {
    let result = env::var("STL_DATABASE_URL").unwrap_or_else(|_| {
        info!("STL_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

/// Creates a connection pool. `acquire_timeout` bounds both the wait for a pooled connection and SQLite's own wait
/// for a lock held by another writer.
pub async fn new_pool(
    url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<SqlitePool, SqliteDatabaseError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(acquire_timeout);
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect_with(options)
        .await?;
    Ok(pool)
}
