use serde::{Deserialize, Serialize};

use crate::config;

/// `page`, `limit`, `sortBy`, `sortOrder` and `searchTerm` as they arrive on
/// list endpoints. Module-specific filters are extracted separately from the
/// same query string.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub search_term: Option<String>,
}

impl PaginationQuery {
    pub fn page_request(&self) -> PageRequest {
        let api = &config::config().api;
        PageRequest::new(self.page, self.limit, api.default_page_limit, api.max_page_limit)
    }

    /// Trimmed search term, `None` when blank
    pub fn search(&self) -> Option<&str> {
        self.search_term.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    pub fn new(page: Option<i64>, limit: Option<i64>, default_limit: i64, max_limit: i64) -> Self {
        let page = page.filter(|p| *p >= 1).unwrap_or(1);
        let limit = limit.filter(|l| *l >= 1).unwrap_or(default_limit).min(max_limit.max(1));
        Self { page, limit }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    #[serde(rename = "totalPage")]
    pub total_page: i64,
}

impl PageMeta {
    pub fn new(request: PageRequest, total: i64) -> Self {
        let total_page = if total <= 0 { 0 } else { (total + request.limit - 1) / request.limit };
        Self {
            page: request.page,
            limit: request.limit,
            total,
            total_page,
        }
    }
}
