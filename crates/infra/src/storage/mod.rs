//! Tenant-scoped storage boundary.
//!
//! Aggregates are stored as rows keyed by (tenant, id) with a soft-delete flag
//! and a version column. Writes happen inside transactions; a conditional
//! update on the loaded version is the only concurrency guard (no locks).
//!
//! ```text
//! Database ── connection() ──> Connection (reads, autocommit writes)
//!          └─ begin() ───────> Transaction ── commit() / rollback() / drop
//! ```

pub mod in_memory;
pub mod postgres;
pub mod query;
pub mod scan;
pub mod r#trait;

pub use in_memory::{InMemoryConnection, InMemoryDatabase, InMemoryTransaction};
pub use postgres::{PgDatabase, PgRepository, ensure_table};
pub use query::{Direction, Filter, ListQuery, Order, Page};
pub use scan::{SCAN_PAGE_SIZE, scan_all};
pub use r#trait::{Database, Record, Repository, StorageError, Transaction};
