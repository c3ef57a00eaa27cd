//! Pagination request to SQL query builder
//!
//! Turns a loosely typed [`PaginationRequest`] (as received by list endpoints)
//! into a [`QueryBuilder`] with normalized ordering, paging and equality
//! filters, and renders the matching parameterized SQL tail.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Page used when none is requested
pub const DEFAULT_PAGE: u32 = 1;

/// Page size used when none is requested
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Upper bound for the page size
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Ordering used when none is requested
pub const DEFAULT_SORT: &str = "id asc";

static FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
        .unwrap_or_else(|e| unreachable!("field pattern is valid: {e}"))
});

/// Errors raised while building a query
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// A sort or filter field is not a plain column name
    #[error("Invalid field name '{0}'")]
    InvalidField(String),

    /// A sort direction other than `asc` or `desc`
    #[error("Invalid sort direction '{0}'")]
    InvalidDirection(String),

    /// A filter term without `=`
    #[error("Invalid filter '{0}', expected field=value")]
    InvalidFilter(String),
}

/// Paging request as sent by clients
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationRequest {
    /// One-based page number
    #[serde(default)]
    pub page: Option<u32>,
    /// Rows per page
    #[serde(default)]
    pub page_size: Option<u32>,
    /// `"<field> [asc|desc]"`, comma separated
    #[serde(default, alias = "order")]
    pub sort: Option<String>,
    /// `field=value` pairs joined by `,` or `&`
    #[serde(default)]
    pub filter: Option<String>,
}

impl PaginationRequest {
    /// Request for `page` with `page_size` rows
    #[must_use]
    pub fn page(page: u32, page_size: u32) -> Self {
        Self {
            page: Some(page),
            page_size: Some(page_size),
            ..Self::default()
        }
    }

    /// Sets the ordering
    #[must_use]
    pub fn sorted_by(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    /// Sets the filter
    #[must_use]
    pub fn filtered_by(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Ascending
    Asc,
    /// Descending
    Desc,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Asc => f.write_str("ASC"),
            Direction::Desc => f.write_str("DESC"),
        }
    }
}

/// One ordering term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ordering {
    /// Column
    pub field: String,
    /// Direction
    pub direction: Direction,
}

/// One equality filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    /// Column
    pub field: String,
    /// Value, bound as a parameter
    pub value: String,
}

/// Normalized query parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryBuilder {
    page: u32,
    page_size: u32,
    ordering: Vec<Ordering>,
    filters: Vec<Filter>,
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
            ordering: vec![Ordering {
                field: "id".to_string(),
                direction: Direction::Asc,
            }],
            filters: Vec::new(),
        }
    }
}

impl QueryBuilder {
    /// Builds a query from an optional request, applying defaults
    ///
    /// # Errors
    ///
    /// Fails on field names that are not plain identifiers, unknown sort
    /// directions and filter terms without `=`.
    pub fn from_request(request: Option<&PaginationRequest>) -> Result<Self, QueryError> {
        let Some(request) = request else {
            return Ok(Self::default());
        };

        let page = request.page.filter(|p| *p > 0).unwrap_or(DEFAULT_PAGE);
        let page_size = request
            .page_size
            .filter(|s| *s > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE);
        let sort = request
            .sort
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_SORT);

        Ok(Self {
            page,
            page_size,
            ordering: parse_ordering(sort)?,
            filters: parse_filters(request.filter.as_deref().unwrap_or_default())?,
        })
    }

    /// Whether the query is ordered
    #[must_use]
    pub fn has_ordering(&self) -> bool {
        !self.ordering.is_empty()
    }

    /// Whether the query is paged
    #[must_use]
    pub fn has_pagination(&self) -> bool {
        self.page_size > 0
    }

    /// Whether the query filters rows
    #[must_use]
    pub fn has_filters(&self) -> bool {
        !self.filters.is_empty()
    }

    /// One-based page number
    #[must_use]
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Rows per page
    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Rows skipped before the page
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }

    /// Ordering terms
    #[must_use]
    pub fn ordering(&self) -> &[Ordering] {
        &self.ordering
    }

    /// Equality filters
    #[must_use]
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Renders ` WHERE .. ORDER BY .. LIMIT .. OFFSET ..` with `$n` placeholders
    ///
    /// Returns the SQL tail and the filter values to bind, in order.
    #[must_use]
    pub fn to_sql(&self) -> (String, Vec<String>) {
        let mut sql = String::new();
        let mut params = Vec::with_capacity(self.filters.len());

        if self.has_filters() {
            let terms: Vec<String> = self
                .filters
                .iter()
                .enumerate()
                .map(|(i, f)| format!("{} = ${}", f.field, i + 1))
                .collect();
            sql.push_str(" WHERE ");
            sql.push_str(&terms.join(" AND "));
            params.extend(self.filters.iter().map(|f| f.value.clone()));
        }

        if self.has_ordering() {
            let terms: Vec<String> = self
                .ordering
                .iter()
                .map(|o| format!("{} {}", o.field, o.direction))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }

        if self.has_pagination() {
            sql.push_str(&format!(" LIMIT {} OFFSET {}", self.page_size, self.offset()));
        }
        (sql, params)
    }
}

fn check_field(field: &str) -> Result<String, QueryError> {
    if FIELD.is_match(field) {
        Ok(field.to_string())
    } else {
        Err(QueryError::InvalidField(field.to_string()))
    }
}

fn parse_ordering(sort: &str) -> Result<Vec<Ordering>, QueryError> {
    sort.split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(|term| {
            let mut parts = term.split_whitespace();
            let field = check_field(parts.next().unwrap_or_default())?;
            let direction = match parts.next().map(str::to_ascii_lowercase).as_deref() {
                None | Some("asc") => Direction::Asc,
                Some("desc") => Direction::Desc,
                Some(other) => return Err(QueryError::InvalidDirection(other.to_string())),
            };
            if let Some(extra) = parts.next() {
                return Err(QueryError::InvalidDirection(extra.to_string()));
            }
            Ok(Ordering { field, direction })
        })
        .collect()
}

fn parse_filters(filter: &str) -> Result<Vec<Filter>, QueryError> {
    filter
        .split([',', '&'])
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(|term| {
            let (field, value) = term
                .split_once('=')
                .ok_or_else(|| QueryError::InvalidFilter(term.to_string()))?;
            Ok(Filter {
                field: check_field(field.trim())?,
                value: value.trim().to_string(),
            })
        })
        .collect()
}
