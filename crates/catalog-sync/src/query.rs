//! Query string encoding for list endpoints.
//!
//! The Remote Catalog Service expects array filters as `field=[v1,v2]` with
//! literal brackets, and sorting as repeated `sorts=property:DIR` pairs.

use std::fmt;

/// Sort direction of a list query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => write!(f, "ASC"),
            Self::Desc => write!(f, "DESC"),
        }
    }
}

/// Filters and sorting of a list request, without the paging window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    filters: Vec<(String, Vec<String>)>,
    sorts: Vec<(String, SortDirection)>,
}

impl ListFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an array-valued filter.
    #[must_use]
    pub fn filter<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        self.filters.push((
            field.into(),
            values.into_iter().map(|v| v.to_string()).collect(),
        ));
        self
    }

    /// Restricts the query to one sales point.
    #[must_use]
    pub fn sales_point(self, id: i64) -> Self {
        self.filter("idsSalesPoint", [id])
    }

    /// Adds a sort clause; clauses are applied in insertion order.
    #[must_use]
    pub fn sort(mut self, property: impl Into<String>, direction: SortDirection) -> Self {
        self.sorts.push((property.into(), direction));
        self
    }

    /// Combines the filter with a paging window.
    #[must_use]
    pub fn page(&self, start: u64, limit: u32) -> ListQuery {
        ListQuery {
            start,
            limit,
            filter: self.clone(),
        }
    }
}

/// One list request: paging window plus filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub start: u64,
    pub limit: u32,
    pub filter: ListFilter,
}

impl ListQuery {
    /// Encodes the query string, without the leading `?`.
    #[must_use]
    pub fn to_query_string(&self) -> String {
        let mut parts = vec![format!("start={}", self.start), format!("limit={}", self.limit)];

        for (field, values) in &self.filter.filters {
            let joined = values
                .iter()
                .map(|v| urlencoding::encode(v).into_owned())
                .collect::<Vec<_>>()
                .join(",");
            parts.push(format!("{}=[{joined}]", urlencoding::encode(field)));
        }

        for (property, direction) in &self.filter.sorts {
            parts.push(format!("sorts={}:{direction}", urlencoding::encode(property)));
        }

        parts.join("&")
    }
}
