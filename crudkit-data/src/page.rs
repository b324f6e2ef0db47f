use serde::{Deserialize, Serialize};

use crate::error::DataError;
use crate::record::Record;

/// 1-based page/perPage pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u64,
    pub per_page: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
        }
    }
}

impl Pagination {
    pub fn new(page: u64, per_page: u64) -> Self {
        Self { page, per_page }
    }

    /// Reject page 0 and empty pages before anything is sent to a backend.
    pub fn validate(&self) -> Result<(), DataError> {
        if self.page == 0 {
            return Err(DataError::InvalidParams("page is 1-based, got 0".into()));
        }
        if self.per_page == 0 {
            return Err(DataError::InvalidParams("perPage must be positive".into()));
        }
        Ok(())
    }

    /// Number of rows preceding this page. Saturates instead of overflowing,
    /// so absurd page numbers simply land past the last row.
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.per_page)
    }

    pub fn limit(&self) -> u64 {
        self.per_page
    }

    pub fn total_pages(&self, total: u64) -> u64 {
        if self.per_page == 0 {
            0
        } else {
            total.div_ceil(self.per_page)
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn is_asc(self) -> bool {
        matches!(self, SortOrder::Asc)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Single-field sort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    #[serde(default)]
    pub order: SortOrder,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Desc,
        }
    }
}

/// One page of records plus the filtered-but-unpaginated count.
///
/// When the backend cannot count matches, `total` is a best-effort estimate
/// and `total_estimated` is set. Either way `total >= data.len()`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResult {
    pub data: Vec<Record>,
    pub total: u64,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub total_estimated: bool,
}

impl ListResult {
    /// A page whose total the backend reported exactly.
    pub fn exact(data: Vec<Record>, total: u64) -> Self {
        let total = total.max(data.len() as u64);
        Self {
            data,
            total,
            total_estimated: false,
        }
    }

    /// A page whose total is an estimate.
    pub fn estimated(data: Vec<Record>, total: u64) -> Self {
        let total = total.max(data.len() as u64);
        Self {
            data,
            total,
            total_estimated: true,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}
