//! In-memory store for tests/dev.
//!
//! Mirrors the relational store closely enough to exercise the write path:
//!
//! - reads see committed rows plus the reader's own staged writes
//! - transactional writes are staged and validated again at commit
//!   (unique live id on insert, matching version on update)
//! - dropping a transaction discards its staged writes
//! - every call is a suspension point, as with a networked store

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;

use flagplane_core::TenantId;

use super::query::{Direction, Filter, ListQuery, Page};
use super::r#trait::{Database, Record, Repository, StorageError, Transaction};

#[derive(Debug, Clone)]
struct StoredRow {
    seq: u64,
    tenant: TenantId,
    id: String,
    deleted: bool,
    version: u64,
    data: Value,
}

impl StoredRow {
    fn is_live(&self, tenant: &TenantId, id: &str) -> bool {
        !self.deleted && self.tenant == *tenant && self.id == id
    }
}

#[derive(Debug, Clone)]
enum PendingWrite {
    Insert {
        table: &'static str,
        row: StoredRow,
    },
    Update {
        table: &'static str,
        expected_version: u64,
        row: StoredRow,
    },
}

impl PendingWrite {
    fn table(&self) -> &'static str {
        match self {
            PendingWrite::Insert { table, .. } | PendingWrite::Update { table, .. } => table,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    tables: HashMap<&'static str, Vec<StoredRow>>,
    next_seq: u64,
}

impl State {
    fn rows(&self, table: &'static str) -> Vec<StoredRow> {
        self.tables.get(table).cloned().unwrap_or_default()
    }

    fn allocate_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn apply(&mut self, write: &PendingWrite) -> Result<(), StorageError> {
        match write {
            PendingWrite::Insert { table, row } => {
                let rows = self.tables.entry(table).or_default();
                if rows.iter().any(|r| r.is_live(&row.tenant, &row.id)) {
                    return Err(StorageError::AlreadyExists);
                }
                rows.push(row.clone());
            }
            PendingWrite::Update {
                table,
                expected_version,
                row,
            } => {
                let rows = self.tables.entry(table).or_default();
                let mut matched = rows
                    .iter_mut()
                    .filter(|r| r.is_live(&row.tenant, &row.id) && r.version == *expected_version);
                let (Some(target), None) = (matched.next(), matched.next()) else {
                    return Err(StorageError::UnexpectedAffectedRows);
                };
                target.deleted = row.deleted;
                target.version = row.version;
                target.data = row.data.clone();
            }
        }
        Ok(())
    }
}

fn poisoned<T>(_: T) -> StorageError {
    StorageError::Backend("in-memory store lock poisoned".to_string())
}

fn to_row<R: Record>(tenant: &TenantId, record: &R, seq: u64) -> Result<StoredRow, StorageError> {
    Ok(StoredRow {
        seq,
        tenant: tenant.clone(),
        id: record.record_id().to_string(),
        deleted: record.is_deleted(),
        version: record.record_version(),
        data: serde_json::to_value(record)?,
    })
}

fn find<R: Record>(rows: &[StoredRow], tenant: &TenantId, id: &str) -> Result<R, StorageError> {
    let row = rows
        .iter()
        .find(|r| r.is_live(tenant, id))
        .ok_or(StorageError::NotFound)?;
    Ok(serde_json::from_value(row.data.clone())?)
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Option<Ordering> {
    match (a, b) {
        (None | Some(Value::Null), None | Some(Value::Null)) => Some(Ordering::Equal),
        (None | Some(Value::Null), _) => Some(Ordering::Less),
        (_, None | Some(Value::Null)) => Some(Ordering::Greater),
        (Some(Value::Number(x)), Some(Value::Number(y))) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Some(Value::String(x)), Some(Value::String(y))) => Some(x.cmp(y)),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => Some(x.cmp(y)),
        _ => None,
    }
}

fn matches(filter: &Filter, data: &Value) -> bool {
    match filter {
        Filter::Eq(column, value) => data.get(column) == Some(value),
        Filter::Gte(column, value) => matches!(
            compare(data.get(column), Some(value)),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Filter::Lte(column, value) => matches!(
            compare(data.get(column), Some(value)),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Filter::Search { columns, keyword } => {
            let keyword = keyword.to_lowercase();
            columns.iter().any(|column| {
                data.get(column)
                    .and_then(Value::as_str)
                    .is_some_and(|text| text.to_lowercase().contains(&keyword))
            })
        }
        Filter::In(column, values) => data.get(column).is_some_and(|v| values.contains(v)),
    }
}

fn select<R: Record>(rows: &[StoredRow], query: &ListQuery) -> Result<Page<R>, StorageError> {
    query.validate()?;

    let mut matched: Vec<&StoredRow> = rows
        .iter()
        .filter(|r| !r.deleted && r.tenant == query.tenant)
        .filter(|r| query.filters.iter().all(|f| matches(f, &r.data)))
        .collect();

    matched.sort_by(|a, b| {
        let primary = query.order.map_or(Ordering::Equal, |order| {
            let ord = compare(a.data.get(order.column), b.data.get(order.column)).unwrap_or(Ordering::Equal);
            match order.direction {
                Direction::Asc => ord,
                Direction::Desc => ord.reverse(),
            }
        });
        primary.then(a.seq.cmp(&b.seq))
    });

    let total_count = matched.len() as u64;
    let start = query.offset.min(matched.len());
    let end = match query.limit {
        0 => matched.len(),
        limit => start.saturating_add(limit).min(matched.len()),
    };

    let items = matched[start..end]
        .iter()
        .map(|r| serde_json::from_value(r.data.clone()))
        .collect::<Result<Vec<R>, _>>()?;

    Ok(Page {
        next_offset: query.offset + items.len(),
        items,
        total_count,
    })
}

/// Shared in-memory store. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDatabase {
    state: Arc<RwLock<State>>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows in `table`, soft-deleted ones included.
    pub fn row_count(&self, table: &'static str) -> Result<usize, StorageError> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.tables.get(table).map_or(0, Vec::len))
    }
}

#[async_trait::async_trait]
impl Database for InMemoryDatabase {
    type Connection = InMemoryConnection;
    type Transaction = InMemoryTransaction;

    async fn connection(&self) -> Result<Self::Connection, StorageError> {
        tokio::task::yield_now().await;
        Ok(InMemoryConnection {
            state: Arc::clone(&self.state),
        })
    }

    async fn begin(&self) -> Result<Self::Transaction, StorageError> {
        tokio::task::yield_now().await;
        Ok(InMemoryTransaction {
            state: Arc::clone(&self.state),
            pending: Vec::new(),
            finished: false,
        })
    }
}

/// Non-transactional handle: reads committed rows, writes autocommit.
#[derive(Debug)]
pub struct InMemoryConnection {
    state: Arc<RwLock<State>>,
}

#[async_trait::async_trait]
impl Repository for InMemoryConnection {
    async fn get<R: Record>(&mut self, tenant: &TenantId, id: &str) -> Result<R, StorageError> {
        tokio::task::yield_now().await;
        let rows = self.state.read().map_err(poisoned)?.rows(R::TABLE);
        find(&rows, tenant, id)
    }

    async fn list<R: Record>(&mut self, query: &ListQuery) -> Result<Page<R>, StorageError> {
        tokio::task::yield_now().await;
        let rows = self.state.read().map_err(poisoned)?.rows(R::TABLE);
        select(&rows, query)
    }

    async fn create<R: Record>(&mut self, tenant: &TenantId, record: &R) -> Result<(), StorageError> {
        tokio::task::yield_now().await;
        let mut state = self.state.write().map_err(poisoned)?;
        let seq = state.allocate_seq();
        let row = to_row(tenant, record, seq)?;
        state.apply(&PendingWrite::Insert { table: R::TABLE, row })
    }

    async fn update<R: Record>(
        &mut self,
        tenant: &TenantId,
        record: &R,
        expected_version: u64,
    ) -> Result<(), StorageError> {
        tokio::task::yield_now().await;
        let row = to_row(tenant, record, 0)?;
        let mut state = self.state.write().map_err(poisoned)?;
        state.apply(&PendingWrite::Update {
            table: R::TABLE,
            expected_version,
            row,
        })
    }
}

/// Open transaction over the in-memory store.
#[derive(Debug)]
pub struct InMemoryTransaction {
    state: Arc<RwLock<State>>,
    pending: Vec<PendingWrite>,
    finished: bool,
}

impl InMemoryTransaction {
    /// Committed rows of `table` with this transaction's staged writes on top.
    fn visible_rows(&self, table: &'static str) -> Result<Vec<StoredRow>, StorageError> {
        let mut view = State::default();
        view.tables
            .insert(table, self.state.read().map_err(poisoned)?.rows(table));
        for write in self.pending.iter().filter(|w| w.table() == table) {
            // A staged write that no longer applies is reported by commit.
            let _ = view.apply(write);
        }
        Ok(view.tables.remove(table).unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl Repository for InMemoryTransaction {
    async fn get<R: Record>(&mut self, tenant: &TenantId, id: &str) -> Result<R, StorageError> {
        tokio::task::yield_now().await;
        find(&self.visible_rows(R::TABLE)?, tenant, id)
    }

    async fn list<R: Record>(&mut self, query: &ListQuery) -> Result<Page<R>, StorageError> {
        tokio::task::yield_now().await;
        select(&self.visible_rows(R::TABLE)?, query)
    }

    async fn create<R: Record>(&mut self, tenant: &TenantId, record: &R) -> Result<(), StorageError> {
        tokio::task::yield_now().await;
        let id = record.record_id();
        if self.visible_rows(R::TABLE)?.iter().any(|r| r.is_live(tenant, id)) {
            return Err(StorageError::AlreadyExists);
        }
        let seq = self.state.write().map_err(poisoned)?.allocate_seq();
        self.pending.push(PendingWrite::Insert {
            table: R::TABLE,
            row: to_row(tenant, record, seq)?,
        });
        Ok(())
    }

    async fn update<R: Record>(
        &mut self,
        tenant: &TenantId,
        record: &R,
        expected_version: u64,
    ) -> Result<(), StorageError> {
        tokio::task::yield_now().await;
        let id = record.record_id();
        let affected = self
            .visible_rows(R::TABLE)?
            .iter()
            .filter(|r| r.is_live(tenant, id) && r.version == expected_version)
            .count();
        if affected != 1 {
            return Err(StorageError::UnexpectedAffectedRows);
        }
        self.pending.push(PendingWrite::Update {
            table: R::TABLE,
            expected_version,
            row: to_row(tenant, record, 0)?,
        });
        Ok(())
    }
}

#[async_trait::async_trait]
impl Transaction for InMemoryTransaction {
    async fn commit(mut self) -> Result<(), StorageError> {
        tokio::task::yield_now().await;
        self.finished = true;
        let pending = std::mem::take(&mut self.pending);
        if pending.is_empty() {
            return Ok(());
        }

        let mut state = self.state.write().map_err(poisoned)?;
        let mut scratch = State::default();
        for write in &pending {
            let table = write.table();
            if !scratch.tables.contains_key(table) {
                scratch.tables.insert(table, state.rows(table));
            }
            scratch.apply(write)?;
        }
        state.tables.extend(scratch.tables);
        Ok(())
    }

    async fn rollback(mut self) -> Result<(), StorageError> {
        self.finished = true;
        self.pending.clear();
        Ok(())
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        if !self.finished && !self.pending.is_empty() {
            tracing::debug!(
                staged_writes = self.pending.len(),
                "transaction dropped before commit; staged writes discarded"
            );
        }
    }
}
