use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use flagplane_core::TenantId;

use super::query::{ListQuery, Page};

/// A row type a repository can store.
///
/// Records serialize to a JSON object whose top-level keys are the columns
/// filters and orderings refer to.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Logical table name.
    const TABLE: &'static str;

    /// Identifier, unique within a tenant among live rows.
    fn record_id(&self) -> &str;

    /// Version the record will be stored at.
    fn record_version(&self) -> u64;

    /// Soft-delete flag.
    fn is_deleted(&self) -> bool;
}

/// Storage-level failure.
///
/// The first three variants are sentinels the service layer translates into
/// caller-facing outcomes; everything else is an infrastructure failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// No live row matches id + tenant.
    #[error("not found")]
    NotFound,

    /// A live row with the same id + tenant already exists.
    #[error("already exists")]
    AlreadyExists,

    /// A conditional write did not affect exactly one row.
    #[error("unexpected affected rows")]
    UnexpectedAffectedRows,

    /// The query could not be expressed (bad column name, bad delete, ...).
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// A row could not be (de)serialized.
    #[error("serialization: {0}")]
    Serialization(String),

    /// The backing store failed.
    #[error("backend: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(value: serde_json::Error) -> Self {
        StorageError::Serialization(value.to_string())
    }
}

/// Per-table storage gateway, implemented by both plain connections and open
/// transactions.
///
/// Every operation is scoped by tenant and ignores soft-deleted rows.
#[async_trait::async_trait]
pub trait Repository: Send {
    /// Fetch one live row, or `NotFound`.
    async fn get<R: Record>(&mut self, tenant: &TenantId, id: &str) -> Result<R, StorageError>;

    /// Filtered, ordered, offset-paginated listing of live rows.
    async fn list<R: Record>(&mut self, query: &ListQuery) -> Result<Page<R>, StorageError>;

    /// Insert a row; `AlreadyExists` when a live row with the same id exists.
    async fn create<R: Record>(&mut self, tenant: &TenantId, record: &R) -> Result<(), StorageError>;

    /// Conditional write of a live row still at `expected_version`.
    ///
    /// Fails with `UnexpectedAffectedRows` unless exactly one row matched.
    async fn update<R: Record>(
        &mut self,
        tenant: &TenantId,
        record: &R,
        expected_version: u64,
    ) -> Result<(), StorageError>;

    /// Soft delete: an update of a record whose deleted flag is already set.
    async fn delete<R: Record>(
        &mut self,
        tenant: &TenantId,
        record: &R,
        expected_version: u64,
    ) -> Result<(), StorageError> {
        if !record.is_deleted() {
            return Err(StorageError::InvalidQuery(format!(
                "{}: delete requires a soft-deleted record",
                R::TABLE
            )));
        }
        self.update(tenant, record, expected_version).await
    }
}

/// An open transaction. Dropping it without `commit` rolls it back.
#[async_trait::async_trait]
pub trait Transaction: Repository + Sized {
    async fn commit(self) -> Result<(), StorageError>;

    async fn rollback(self) -> Result<(), StorageError>;
}

/// Entry point to a store: plain connections for reads, transactions for writes.
#[async_trait::async_trait]
pub trait Database: Send + Sync {
    type Connection: Repository;
    type Transaction: Transaction;

    async fn connection(&self) -> Result<Self::Connection, StorageError>;

    async fn begin(&self) -> Result<Self::Transaction, StorageError>;
}

#[async_trait::async_trait]
impl<D> Database for std::sync::Arc<D>
where
    D: Database + ?Sized,
{
    type Connection = D::Connection;
    type Transaction = D::Transaction;

    async fn connection(&self) -> Result<Self::Connection, StorageError> {
        (**self).connection().await
    }

    async fn begin(&self) -> Result<Self::Transaction, StorageError> {
        (**self).begin().await
    }
}
