//! Exhaustive listing in fixed-size pages.

use flagplane_core::TenantId;

use super::query::{Filter, ListQuery};
use super::r#trait::{Record, Repository, StorageError};

/// Page size used when a caller needs every matching row.
pub const SCAN_PAGE_SIZE: usize = 500;

/// Collect every live row of `R` in `tenant` matching `filters`.
///
/// Pages through the table until a page comes back short.
pub async fn scan_all<R, Repo>(
    repo: &mut Repo,
    tenant: &TenantId,
    filters: &[Filter],
) -> Result<Vec<R>, StorageError>
where
    R: Record,
    Repo: Repository,
{
    let mut rows = Vec::new();
    let mut offset = 0;
    loop {
        let query = ListQuery::new(tenant.clone())
            .filters(filters.iter().cloned())
            .page(SCAN_PAGE_SIZE, offset);
        let page = repo.list::<R>(&query).await?;
        let fetched = page.items.len();
        rows.extend(page.items);
        if fetched < SCAN_PAGE_SIZE {
            break;
        }
        offset = page.next_offset;
    }
    tracing::trace!(table = R::TABLE, tenant = %tenant, rows = rows.len(), "scan complete");
    Ok(rows)
}
