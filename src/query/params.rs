//! Search parameters and their JSON wire format
//!
//! The wire shape mirrors a typical `SearchRequest` body:
//!
//! ```json
//! {
//!   "filters": [
//!     { "field": "status", "operator": "eq", "value": "COMPLETED" },
//!     { "logicalOperator": "OR", "children": [
//!         { "field": "amount", "operator": "gt", "value": 1000 },
//!         { "field": "orderItems.productCode", "operator": "in", "value": ["A", "B"] }
//!     ]}
//!   ],
//!   "page": 0,
//!   "size": 20,
//!   "sortField": "amount",
//!   "sortDirection": "DESC",
//!   "unpaged": false
//! }
//! ```
//!
//! Top-level filters are AND-ed together; an empty list matches every row.

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::criteria::{FilterCriteria, FilterValue, LogicalOperator, Operator};
use crate::error::{QueryError, Result};
use crate::pagination::decode_cursor;

/// Sort direction for ORDER BY clauses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    /// Ascending order (A-Z, 1-9, oldest-newest)
    #[default]
    #[serde(alias = "asc", alias = "Asc")]
    Asc,
    /// Descending order (Z-A, 9-1, newest-oldest)
    #[serde(alias = "desc", alias = "Desc")]
    Desc,
}

impl SortDirection {
    /// Convert to SQL order string
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Filter, sort and paging input for one search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    /// Root of the filter tree; `None` matches every row
    pub criteria: Option<FilterCriteria>,
    pub page: u32,
    pub size: u32,
    pub sort_field: Option<String>,
    pub sort_direction: SortDirection,
    /// Ignore `page`/`size` and stream every matching row
    pub unpaged: bool,
    /// Explicit row offset from a cursor; overrides `page * size`
    pub(crate) start: Option<u64>,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            criteria: None,
            page: 0,
            size: EngineConfig::default().default_page_size,
            sort_field: None,
            sort_direction: SortDirection::Asc,
            unpaged: false,
            start: None,
        }
    }
}

impl SearchParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_criteria(mut self, criteria: FilterCriteria) -> Self {
        self.criteria = Some(criteria);
        self
    }

    pub fn with_page(mut self, page: u32, size: u32) -> Self {
        self.page = page;
        self.size = size;
        self.start = None;
        self
    }

    pub fn sorted_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort_field = Some(field.into());
        self.sort_direction = direction;
        self
    }

    pub fn unpaged(mut self) -> Self {
        self.unpaged = true;
        self
    }

    /// Continue after the row identified by `cursor` (see [`crate::pagination::encode_cursor`])
    pub fn after_cursor(mut self, cursor: &str) -> Result<Self> {
        let offset = decode_cursor(cursor).map_err(QueryError::InvalidCursor)?;
        if offset < 0 {
            return Err(QueryError::InvalidCursor("negative cursor offset"));
        }
        // The next offset is bound as an SQL integer, so it must fit in i64.
        let start = offset
            .checked_add(1)
            .and_then(|next| u64::try_from(next).ok())
            .ok_or(QueryError::InvalidCursor("cursor offset out of range"))?;
        self.start = Some(start);
        if self.size > 0 {
            self.page = u32::try_from(start / self.size as u64).unwrap_or(u32::MAX);
        }
        Ok(self)
    }

    /// First row of the requested page
    pub fn offset(&self) -> u64 {
        self.start
            .unwrap_or_else(|| self.page as u64 * self.size as u64)
    }
}

// ============================================================================
// Wire format
// ============================================================================

/// One filter in the wire format: a leaf or a nested group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterInput {
    Group {
        #[serde(rename = "logicalOperator")]
        logical_operator: LogicalOperator,
        children: Vec<FilterInput>,
    },
    Leaf {
        field: String,
        operator: String,
        #[serde(default)]
        value: serde_json::Value,
    },
}

impl FilterInput {
    /// Convert into a validated criteria tree
    pub fn into_criteria(self) -> Result<FilterCriteria> {
        match self {
            FilterInput::Group {
                logical_operator,
                children,
            } => {
                let children = children
                    .into_iter()
                    .map(FilterInput::into_criteria)
                    .collect::<Result<Vec<_>>>()?;
                FilterCriteria::group(logical_operator, children)
            }
            FilterInput::Leaf {
                field,
                operator,
                value,
            } => {
                let operator: Operator = operator.parse()?;
                let values = match value {
                    serde_json::Value::Null => Vec::new(),
                    serde_json::Value::Array(items) => items
                        .iter()
                        .map(FilterValue::from_json)
                        .collect::<Result<Vec<_>>>()?,
                    scalar => vec![FilterValue::from_json(&scalar)?],
                };
                FilterCriteria::leaf(field, operator, values)
            }
        }
    }
}

/// Search request body as received from the web layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(default)]
    pub filters: Vec<FilterInput>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub size: Option<u32>,
    #[serde(default)]
    pub sort_field: Option<String>,
    #[serde(default)]
    pub sort_direction: Option<SortDirection>,
    #[serde(default)]
    pub unpaged: bool,
    /// Name of a registered projection; the full entity when absent
    #[serde(default)]
    pub projection: Option<String>,
    /// Cursor returned with a previous page
    #[serde(default)]
    pub after: Option<String>,
}

impl SearchRequest {
    /// Validate and convert into [`SearchParams`], using `default_size` when no size is given
    pub fn into_params(self, default_size: u32) -> Result<SearchParams> {
        let mut filters = self
            .filters
            .into_iter()
            .map(FilterInput::into_criteria)
            .collect::<Result<Vec<_>>>()?;

        let criteria = match filters.len() {
            0 => None,
            1 => filters.pop(),
            _ => Some(FilterCriteria::and(filters)?),
        };

        let params = SearchParams {
            criteria,
            page: self.page.unwrap_or(0),
            size: self.size.unwrap_or(default_size),
            sort_field: self.sort_field.filter(|f| !f.trim().is_empty()),
            sort_direction: self.sort_direction.unwrap_or_default(),
            unpaged: self.unpaged,
            start: None,
        };

        match self.after {
            Some(cursor) => params.after_cursor(&cursor),
            None => Ok(params),
        }
    }
}

impl TryFrom<SearchRequest> for SearchParams {
    type Error = QueryError;

    fn try_from(request: SearchRequest) -> Result<Self> {
        request.into_params(EngineConfig::default().default_page_size)
    }
}
