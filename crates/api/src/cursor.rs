//! Offset cursors and list request plumbing shared by every list operation.

use flagplane_infra::storage::{Direction, Order, Page};

use crate::error::ServiceError;

/// Decode a cursor; the empty cursor starts at offset 0.
///
/// Offsets are bounded by what a BIGINT holds.
pub fn parse_cursor(cursor: &str) -> Result<usize, ServiceError> {
    if cursor.is_empty() {
        return Ok(0);
    }
    let offset = cursor.parse::<i64>().map_err(|_| ServiceError::InvalidCursor)?;
    usize::try_from(offset).map_err(|_| ServiceError::InvalidCursor)
}

pub fn encode_cursor(offset: usize) -> String {
    offset.to_string()
}

/// Resolve a requested order column against the columns a list supports.
///
/// An empty column keeps insertion order.
pub fn parse_order(
    column: &str,
    direction: Direction,
    supported: &[&'static str],
) -> Result<Option<Order>, ServiceError> {
    if column.is_empty() {
        return Ok(None);
    }
    supported
        .iter()
        .find(|c| **c == column)
        .map(|c| Some(Order { column: *c, direction }))
        .ok_or(ServiceError::InvalidOrderBy)
}

/// Paging, ordering and search options common to list requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOptions {
    /// Maximum items per page; `0` returns everything.
    pub page_size: usize,
    pub cursor: String,
    pub order_by: String,
    pub direction: Direction,
    pub search_keyword: String,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            page_size: 0,
            cursor: String::new(),
            order_by: String::new(),
            direction: Direction::Asc,
            search_keyword: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub next_cursor: String,
    pub total_count: u64,
}

impl<T> From<Page<T>> for ListResponse<T> {
    fn from(page: Page<T>) -> Self {
        Self {
            next_cursor: encode_cursor(page.next_offset),
            items: page.items,
            total_count: page.total_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursors() {
        assert_eq!(parse_cursor("").unwrap(), 0);
        assert_eq!(parse_cursor("500").unwrap(), 500);
        assert_eq!(parse_cursor("abc").unwrap_err(), ServiceError::InvalidCursor);
        assert_eq!(parse_cursor("-1").unwrap_err(), ServiceError::InvalidCursor);
        assert_eq!(parse_cursor("9223372036854775807").unwrap(), i64::MAX as usize);
        assert_eq!(
            parse_cursor("9223372036854775808").unwrap_err(),
            ServiceError::InvalidCursor
        );
        assert_eq!(encode_cursor(42), "42");
    }

    #[test]
    fn orders() {
        let supported = ["name", "created_at"];
        assert_eq!(parse_order("", Direction::Desc, &supported).unwrap(), None);
        assert_eq!(
            parse_order("name", Direction::Desc, &supported).unwrap(),
            Some(Order::desc("name"))
        );
        assert_eq!(
            parse_order("tags", Direction::Asc, &supported).unwrap_err(),
            ServiceError::InvalidOrderBy
        );
    }
}
