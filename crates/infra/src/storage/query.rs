//! List query model: filters, ordering and offset pagination.

use serde_json::Value;

use flagplane_core::TenantId;

use super::r#trait::StorageError;

/// One predicate over a named column.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `column = value`
    Eq(&'static str, Value),
    /// `column >= value`
    Gte(&'static str, Value),
    /// `column <= value`
    Lte(&'static str, Value),
    /// Case-insensitive substring match over any of `columns`.
    Search {
        columns: Vec<&'static str>,
        keyword: String,
    },
    /// `column IN (values)`; an empty set matches nothing.
    In(&'static str, Vec<Value>),
}

impl Filter {
    pub fn columns(&self) -> Vec<&'static str> {
        match self {
            Filter::Eq(c, _) | Filter::Gte(c, _) | Filter::Lte(c, _) | Filter::In(c, _) => vec![*c],
            Filter::Search { columns, .. } => columns.clone(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: &'static str,
    pub direction: Direction,
}

impl Order {
    pub fn asc(column: &'static str) -> Self {
        Self {
            column,
            direction: Direction::Asc,
        }
    }

    pub fn desc(column: &'static str) -> Self {
        Self {
            column,
            direction: Direction::Desc,
        }
    }
}

/// A tenant-scoped listing request.
///
/// Tenant and `deleted = false` predicates are always applied by the
/// repository. Without an order, rows come back in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub tenant: TenantId,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    /// Maximum rows to return; `0` means unlimited.
    pub limit: usize,
    pub offset: usize,
}

impl ListQuery {
    pub fn new(tenant: TenantId) -> Self {
        Self {
            tenant,
            filters: Vec::new(),
            order: None,
            limit: 0,
            offset: 0,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn filters(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        self.filters.extend(filters);
        self
    }

    pub fn order_by(mut self, order: Option<Order>) -> Self {
        self.order = order;
        self
    }

    pub fn page(mut self, limit: usize, offset: usize) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    /// Reject column names that are not plain snake_case identifiers.
    pub fn validate(&self) -> Result<(), StorageError> {
        let ordered = self.order.iter().map(|o| o.column);
        let filtered = self.filters.iter().flat_map(Filter::columns);
        for column in ordered.chain(filtered) {
            if !is_column_name(column) {
                return Err(StorageError::InvalidQuery(format!("bad column name: {column:?}")));
            }
        }
        Ok(())
    }
}

fn is_column_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<R> {
    pub items: Vec<R>,
    /// Offset to resume from (`offset + items.len()`).
    pub next_offset: usize,
    /// Matching rows ignoring limit and offset.
    pub total_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_odd_columns() {
        let ok = ListQuery::new(TenantId::new("ns1")).filter(Filter::Eq("feature_id", Value::from("f")));
        assert!(ok.validate().is_ok());

        let bad = ListQuery::new(TenantId::new("ns1")).order_by(Some(Order::asc("name; drop")));
        assert!(matches!(bad.validate(), Err(StorageError::InvalidQuery(_))));
    }
}
