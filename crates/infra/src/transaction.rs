//! Scoped transaction ownership.
//!
//! A [`TransactionScope`] is the only thing that decides commit vs rollback.
//! Work runs against [`TransactionScope::repository`]; the outcome is handed to
//! [`TransactionScope::finish`]. If the scope is dropped instead (the owning
//! future was cancelled, or a panic unwound through it), the underlying
//! transaction is dropped uncommitted and the store discards it.

use tracing::warn;

use crate::storage::{Database, StorageError, Transaction};

/// Guard over one open transaction.
#[derive(Debug)]
#[must_use = "a transaction scope must be finished, or it is rolled back on drop"]
pub struct TransactionScope<T: Transaction> {
    tx: T,
}

impl<T: Transaction> TransactionScope<T> {
    /// Open a transaction on `db`.
    pub async fn begin<D>(db: &D) -> Result<Self, StorageError>
    where
        D: Database<Transaction = T> + ?Sized,
    {
        Ok(Self { tx: db.begin().await? })
    }

    /// Repository bound to the open transaction.
    pub fn repository(&mut self) -> &mut T {
        &mut self.tx
    }

    /// Commit on `Ok`, roll back on `Err`.
    ///
    /// The unit of work's error is returned unchanged; a failed commit is
    /// converted into the caller's error type. Rollback failures are only
    /// logged since the original error is what the caller needs to see.
    pub async fn finish<V, E>(self, outcome: Result<V, E>) -> Result<V, E>
    where
        E: From<StorageError>,
    {
        match outcome {
            Ok(value) => {
                self.tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.tx.rollback().await {
                    warn!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }
}
