use log::*;
use sqlx::{Connection, Sqlite, SqliteConnection, SqlitePool, Transaction};

use crate::{db::sqlite::SqliteDatabaseError, settlement_objects::TxOptions};

/// A database transaction together with the options it was opened with.
///
/// Every settlement step takes a `&mut UnitOfWork`, so none of them can run outside a transaction. Dropping a unit
/// of work without committing rolls it back.
pub struct UnitOfWork<'c> {
    tx: Transaction<'c, Sqlite>,
    options: TxOptions,
}

impl UnitOfWork<'static> {
    pub async fn begin(pool: &SqlitePool, options: &TxOptions) -> Result<Self, SqliteDatabaseError> {
        let tx = tokio::time::timeout(options.acquire_timeout, pool.begin())
            .await
            .map_err(|_| SqliteDatabaseError::AcquireTimeout)??;
        trace!("🗃️ Unit of work started ({:?}, {:?})", options.isolation, options.strategy);
        Ok(Self { tx, options: options.clone() })
    }
}

impl<'c> UnitOfWork<'c> {
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    pub fn options(&self) -> &TxOptions {
        &self.options
    }

    /// Opens a nested unit of work backed by a savepoint. Committing it releases the savepoint; rolling it back
    /// undoes only the work done since it was opened.
    pub async fn savepoint(&mut self) -> Result<UnitOfWork<'_>, SqliteDatabaseError> {
        let tx = Connection::begin(&mut *self.tx).await?;
        Ok(UnitOfWork { tx, options: self.options.clone() })
    }

    pub async fn commit(self) -> Result<(), SqliteDatabaseError> {
        self.tx.commit().await?;
        trace!("🗃️ Unit of work committed");
        Ok(())
    }

    pub async fn rollback(self) -> Result<(), SqliteDatabaseError> {
        self.tx.rollback().await?;
        trace!("🗃️ Unit of work rolled back");
        Ok(())
    }
}
