//! Tenant-wide uniqueness checks over values owned by many aggregates.
//!
//! The check is advisory: it reads committed rows before the write
//! transaction opens, so two concurrent writers can both pass it. Only the
//! live-id index is enforced by the store itself.

use std::collections::HashSet;

use thiserror::Error;

use flagplane_core::TenantId;

use crate::storage::{Filter, Record, Repository, StorageError, scan_all};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UniquenessError {
    /// Two existing aggregates already share a value.
    #[error("existing value is duplicated: {0}")]
    Duplicate(String),

    /// A candidate collides with an existing value.
    #[error("value already exists: {0}")]
    AlreadyExists(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Set of values currently held by live aggregates of one tenant.
#[derive(Debug, Default, Clone)]
pub struct UniquenessIndex {
    values: HashSet<String>,
}

impl UniquenessIndex {
    /// Build the index, failing on a value held twice.
    pub fn build<I, S>(values: I) -> Result<Self, UniquenessError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut index = Self::default();
        for value in values {
            let value = value.into();
            if index.values.contains(&value) {
                return Err(UniquenessError::Duplicate(value));
            }
            index.values.insert(value);
        }
        Ok(index)
    }

    pub fn contains(&self, value: &str) -> bool {
        self.values.contains(value)
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    /// Fail on the first candidate already present.
    pub fn ensure_absent<'a>(
        &self,
        candidates: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), UniquenessError> {
        match candidates.into_iter().find(|c| self.contains(c)) {
            Some(taken) => Err(UniquenessError::AlreadyExists(taken.to_string())),
            None => Ok(()),
        }
    }
}

/// Every live `R` of one tenant, read once and checked against any number of
/// unique value sets.
#[derive(Debug, Clone)]
pub struct LiveRows<R> {
    tenant: TenantId,
    rows: Vec<R>,
}

impl<R: Record> LiveRows<R> {
    pub async fn scan<Repo: Repository>(repo: &mut Repo, tenant: &TenantId) -> Result<Self, StorageError> {
        let rows: Vec<R> = scan_all(repo, tenant, &[] as &[Filter]).await?;
        tracing::debug!(table = R::TABLE, tenant = %tenant, scanned = rows.len(), "live rows scanned");
        Ok(Self {
            tenant: tenant.clone(),
            rows,
        })
    }

    /// Check `candidates` against the values `extract` yields for each row.
    ///
    /// An empty candidate list passes without building an index.
    pub fn ensure_unique<F, V>(&self, candidates: &[String], extract: F) -> Result<(), UniquenessError>
    where
        F: Fn(&R) -> V,
        V: IntoIterator<Item = String>,
    {
        if candidates.is_empty() {
            return Ok(());
        }
        let index = UniquenessIndex::build(self.rows.iter().flat_map(|row| extract(row)))?;
        tracing::debug!(
            table = R::TABLE,
            tenant = %self.tenant,
            values = index.len(),
            "uniqueness index built"
        );
        index.ensure_absent(candidates.iter().map(String::as_str))
    }
}
