//! Postgres-backed repositories.
//!
//! Every record type lives in its own table:
//!
//! ```text
//! seq      BIGSERIAL PRIMARY KEY   -- insertion order, pagination tie-break
//! tenant   TEXT NOT NULL
//! id       TEXT NOT NULL
//! deleted  BOOLEAN NOT NULL
//! version  BIGINT NOT NULL         -- optimistic concurrency precondition
//! data     JSONB NOT NULL          -- the serialized record
//! UNIQUE (tenant, id) WHERE NOT deleted
//! ```
//!
//! Filters and orderings address top-level keys of `data`.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StorageError |
//! |------------|----------------------|--------------|
//! | Database (unique violation) | `23505` | `AlreadyExists` |
//! | Database (other) | Any other | `Backend` |
//! | PoolClosed / Io / other | N/A | `Backend` |

use std::ops::DerefMut;
use std::sync::Arc;

use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnection, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::{Span, instrument};

use flagplane_core::TenantId;

use super::query::{Direction, Filter, ListQuery, Page};
use super::r#trait::{Database, Record, Repository, StorageError, Transaction};

/// Postgres store.
///
/// Uses the SQLx connection pool, which is thread-safe; clones share the pool.
#[derive(Debug, Clone)]
pub struct PgDatabase {
    pool: Arc<PgPool>,
}

impl PgDatabase {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Open a pool against `url`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl Database for PgDatabase {
    type Connection = PgRepository<PoolConnection<Postgres>>;
    type Transaction = PgRepository<sqlx::Transaction<'static, Postgres>>;

    async fn connection(&self) -> Result<Self::Connection, StorageError> {
        let conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))?;
        Ok(PgRepository { conn })
    }

    async fn begin(&self) -> Result<Self::Transaction, StorageError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(PgRepository { conn: tx })
    }
}

/// Repository over a pooled connection or an open transaction.
pub struct PgRepository<C> {
    conn: C,
}

#[async_trait::async_trait]
impl<C> Repository for PgRepository<C>
where
    C: DerefMut<Target = PgConnection> + Send,
{
    #[instrument(skip(self), fields(table = R::TABLE, tenant = %tenant), err)]
    async fn get<R: Record>(&mut self, tenant: &TenantId, id: &str) -> Result<R, StorageError> {
        let sql = format!(
            "SELECT data FROM {} WHERE tenant = $1 AND id = $2 AND NOT deleted",
            R::TABLE
        );
        let row = sqlx::query(&sql)
            .bind(tenant.as_str())
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await
            .map_err(|e| map_sqlx_error("get", e))?
            .ok_or(StorageError::NotFound)?;
        decode(&row)
    }

    #[instrument(
        skip(self, query),
        fields(table = R::TABLE, tenant = %query.tenant, rows = tracing::field::Empty),
        err
    )]
    async fn list<R: Record>(&mut self, query: &ListQuery) -> Result<Page<R>, StorageError> {
        query.validate()?;
        let bounds = PageBounds::of(query)?;

        // Items and total come from one statement, so they share a snapshot.
        let mut select = select_page(R::TABLE, query, bounds);
        let rows = select
            .build()
            .fetch_all(&mut *self.conn)
            .await
            .map_err(|e| map_sqlx_error("list", e))?;
        let total: i64 = match rows.first() {
            Some(row) => row
                .try_get("total")
                .map_err(|e| StorageError::Serialization(format!("failed to read total column: {e}")))?,
            None if query.offset == 0 => 0,
            // past the last row: the window count has nothing to ride on
            None => {
                let mut count = QueryBuilder::<Postgres>::new(format!("SELECT COUNT(*) FROM {}", R::TABLE));
                push_conditions(&mut count, query);
                count
                    .build_query_scalar()
                    .fetch_one(&mut *self.conn)
                    .await
                    .map_err(|e| map_sqlx_error("count", e))?
            }
        };
        let items = rows.iter().map(decode).collect::<Result<Vec<R>, _>>()?;

        Span::current().record("rows", items.len());
        Ok(Page {
            next_offset: query.offset + items.len(),
            items,
            total_count: u64::try_from(total).unwrap_or_default(),
        })
    }

    #[instrument(skip(self, record), fields(table = R::TABLE, tenant = %tenant), err)]
    async fn create<R: Record>(&mut self, tenant: &TenantId, record: &R) -> Result<(), StorageError> {
        let sql = format!(
            "INSERT INTO {} (tenant, id, deleted, version, data) VALUES ($1, $2, $3, $4, $5)",
            R::TABLE
        );
        sqlx::query(&sql)
            .bind(tenant.as_str())
            .bind(record.record_id())
            .bind(record.is_deleted())
            .bind(record.record_version() as i64)
            .bind(Json(serde_json::to_value(record)?))
            .execute(&mut *self.conn)
            .await
            .map_err(|e| map_sqlx_error("create", e))?;
        Ok(())
    }

    #[instrument(skip(self, record), fields(table = R::TABLE, tenant = %tenant), err)]
    async fn update<R: Record>(
        &mut self,
        tenant: &TenantId,
        record: &R,
        expected_version: u64,
    ) -> Result<(), StorageError> {
        let sql = format!(
            "UPDATE {} SET deleted = $1, version = $2, data = $3 \
             WHERE tenant = $4 AND id = $5 AND NOT deleted AND version = $6",
            R::TABLE
        );
        let result = sqlx::query(&sql)
            .bind(record.is_deleted())
            .bind(record.record_version() as i64)
            .bind(Json(serde_json::to_value(record)?))
            .bind(tenant.as_str())
            .bind(record.record_id())
            .bind(expected_version as i64)
            .execute(&mut *self.conn)
            .await
            .map_err(|e| map_sqlx_error("update", e))?;
        if result.rows_affected() != 1 {
            return Err(StorageError::UnexpectedAffectedRows);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Transaction for PgRepository<sqlx::Transaction<'static, Postgres>> {
    async fn commit(self) -> Result<(), StorageError> {
        self.conn
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self) -> Result<(), StorageError> {
        self.conn
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

/// Create the table and live-id index for `R` if missing.
pub async fn ensure_table<R: Record>(pool: &PgPool) -> Result<(), StorageError> {
    let table = R::TABLE;
    let statements = [
        format!(
            "CREATE TABLE IF NOT EXISTS {table} (\
             seq BIGSERIAL PRIMARY KEY, \
             tenant TEXT NOT NULL, \
             id TEXT NOT NULL, \
             deleted BOOLEAN NOT NULL DEFAULT FALSE, \
             version BIGINT NOT NULL, \
             data JSONB NOT NULL)"
        ),
        format!("CREATE UNIQUE INDEX IF NOT EXISTS {table}_live_id ON {table} (tenant, id) WHERE NOT deleted"),
    ];
    for sql in &statements {
        sqlx::query(sql)
            .execute(pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_table", e))?;
    }
    tracing::info!(table, "table ready");
    Ok(())
}

/// LIMIT / OFFSET as Postgres accepts them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PageBounds {
    /// `None` returns every remaining row.
    limit: Option<i64>,
    offset: i64,
}

impl PageBounds {
    /// A limit past `i64::MAX` is as good as none; an offset past it cannot be
    /// expressed and is rejected.
    fn of(query: &ListQuery) -> Result<Self, StorageError> {
        let limit = (query.limit > 0).then(|| i64::try_from(query.limit).unwrap_or(i64::MAX));
        let offset = i64::try_from(query.offset)
            .map_err(|_| StorageError::InvalidQuery(format!("offset {} out of range", query.offset)))?;
        Ok(Self { limit, offset })
    }
}

fn select_page(table: &str, query: &ListQuery, bounds: PageBounds) -> QueryBuilder<'static, Postgres> {
    let mut select = QueryBuilder::<Postgres>::new(format!("SELECT data, COUNT(*) OVER() AS total FROM {table}"));
    push_conditions(&mut select, query);
    match query.order {
        Some(order) => {
            let direction = match order.direction {
                Direction::Asc => "ASC",
                Direction::Desc => "DESC",
            };
            select.push(format!(" ORDER BY data->'{}' {direction}, seq ASC", order.column));
        }
        None => {
            select.push(" ORDER BY seq ASC");
        }
    }
    if let Some(limit) = bounds.limit {
        select.push(" LIMIT ").push_bind(limit);
    }
    select.push(" OFFSET ").push_bind(bounds.offset);
    select
}

fn push_conditions(qb: &mut QueryBuilder<'_, Postgres>, query: &ListQuery) {
    qb.push(" WHERE tenant = ")
        .push_bind(query.tenant.as_str().to_owned())
        .push(" AND NOT deleted");

    for filter in &query.filters {
        qb.push(" AND ");
        match filter {
            Filter::Eq(column, value) => {
                qb.push(format!("data->'{column}' = ")).push_bind(Json(value.clone()));
            }
            Filter::Gte(column, value) => {
                qb.push(format!("data->'{column}' >= ")).push_bind(Json(value.clone()));
            }
            Filter::Lte(column, value) => {
                qb.push(format!("data->'{column}' <= ")).push_bind(Json(value.clone()));
            }
            Filter::Search { columns, keyword } if !columns.is_empty() => {
                let pattern = format!("%{}%", escape_like(keyword));
                qb.push("(");
                for (idx, column) in columns.iter().enumerate() {
                    if idx > 0 {
                        qb.push(" OR ");
                    }
                    qb.push(format!("data->>'{column}' ILIKE ")).push_bind(pattern.clone());
                }
                qb.push(")");
            }
            Filter::In(column, values) if !values.is_empty() => {
                qb.push(format!("data->'{column}' IN ("));
                let mut separated = qb.separated(", ");
                for value in values {
                    separated.push_bind(Json(value.clone()));
                }
                separated.push_unseparated(")");
            }
            Filter::Search { .. } | Filter::In(..) => {
                qb.push("FALSE");
            }
        }
    }
}

fn escape_like(keyword: &str) -> String {
    keyword
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn decode<R: Record>(row: &PgRow) -> Result<R, StorageError> {
    let Json(value): Json<serde_json::Value> = row
        .try_get("data")
        .map_err(|e| StorageError::Serialization(format!("failed to read data column: {e}")))?;
    Ok(serde_json::from_value(value)?)
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StorageError {
    match err {
        sqlx::Error::Database(db_err) => {
            if db_err.code().as_deref() == Some("23505") {
                return StorageError::AlreadyExists;
            }
            StorageError::Backend(format!("database error in {}: {}", operation, db_err.message()))
        }
        other => StorageError::Backend(format!("{} failed: {}", operation, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_bounds_stay_within_bigint() {
        let tenant = TenantId::new("ns1");
        let unbounded = ListQuery::new(tenant.clone()).page(0, 7);
        assert_eq!(PageBounds::of(&unbounded).unwrap(), PageBounds { limit: None, offset: 7 });

        let huge_limit = ListQuery::new(tenant.clone()).page(usize::MAX, 0);
        assert_eq!(PageBounds::of(&huge_limit).unwrap().limit, Some(i64::MAX));

        let huge_offset = ListQuery::new(tenant).page(10, i64::MAX as usize + 1);
        assert!(matches!(
            PageBounds::of(&huge_offset).unwrap_err(),
            StorageError::InvalidQuery(_)
        ));
    }

    #[test]
    fn page_and_total_come_from_one_statement() {
        let query = ListQuery::new(TenantId::new("ns1")).page(3, 6);
        let bounds = PageBounds::of(&query).unwrap();
        let qb = select_page("pushes", &query, bounds);
        assert_eq!(
            qb.sql(),
            "SELECT data, COUNT(*) OVER() AS total FROM pushes WHERE tenant = $1 AND NOT deleted \
             ORDER BY seq ASC LIMIT $2 OFFSET $3"
        );
    }

    #[test]
    fn unique_violation_maps_to_already_exists() {
        assert_eq!(
            map_sqlx_error("create", sqlx::Error::Database(Box::new(UniqueViolation))),
            StorageError::AlreadyExists
        );
        assert!(matches!(
            map_sqlx_error("create", sqlx::Error::PoolClosed),
            StorageError::Backend(_)
        ));
    }

    #[derive(Debug)]
    struct UniqueViolation;

    impl std::fmt::Display for UniqueViolation {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("duplicate key value violates unique constraint")
        }
    }

    impl std::error::Error for UniqueViolation {}

    impl sqlx::error::DatabaseError for UniqueViolation {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint"
        }

        fn code(&self) -> Option<std::borrow::Cow<'_, str>> {
            Some("23505".into())
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::UniqueViolation
        }
    }

    #[test]
    fn like_patterns_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[test]
    fn conditions_always_scope_tenant_and_soft_delete() {
        let query = ListQuery::new(TenantId::new("ns1"))
            .filter(Filter::Eq("archived", serde_json::Value::Bool(false)))
            .filter(Filter::In("status", vec![]));
        let mut qb = QueryBuilder::<Postgres>::new("SELECT data FROM experiments");
        push_conditions(&mut qb, &query);
        assert_eq!(
            qb.sql(),
            "SELECT data FROM experiments WHERE tenant = $1 AND NOT deleted \
             AND data->'archived' = $2 AND FALSE"
        );
    }
}
