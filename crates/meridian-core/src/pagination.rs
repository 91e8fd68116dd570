//! # Pagination
//!
//! Page/offset math and the `PagedResult` envelope returned by every list
//! query.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PaginationParams { page: 3, page_size: 20 }                           │
//! │       │                                                                 │
//! │       ├── validate()  page < 1, size outside 1..=max, or an offset     │
//! │       │               past i64 → error                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  LIMIT 20 OFFSET 40                                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  PagedResult { items, total_items, total_pages, current_page,          │
//! │                page_size }                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Requested page. `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    DEFAULT_PAGE_SIZE
}

impl Default for PaginationParams {
    fn default() -> Self {
        PaginationParams {
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

impl PaginationParams {
    pub fn new(page: i64, page_size: i64) -> Self {
        PaginationParams { page, page_size }
    }

    /// Checks bounds against the crate default maximum.
    pub fn validate(&self) -> CoreResult<()> {
        self.validate_with_max(MAX_PAGE_SIZE)
    }

    /// Checks `page >= 1`, `1 <= page_size <= max_page_size` and that the
    /// offset fits in an `i64`.
    pub fn validate_with_max(&self, max_page_size: i64) -> CoreResult<()> {
        if self.page < 1 {
            return Err(CoreError::invalid_pagination(format!(
                "page must be at least 1, got {}",
                self.page
            )));
        }
        if self.page_size < 1 || self.page_size > max_page_size {
            return Err(CoreError::invalid_pagination(format!(
                "page_size must be between 1 and {}, got {}",
                max_page_size, self.page_size
            )));
        }
        if (self.page - 1).checked_mul(self.page_size).is_none() {
            return Err(CoreError::invalid_pagination(format!(
                "page {} is out of range for page_size {}",
                self.page, self.page_size
            )));
        }
        Ok(())
    }

    /// Rows to skip. Saturates instead of overflowing on unvalidated input.
    #[must_use]
    pub fn offset(&self) -> i64 {
        (self.page - 1).max(0).saturating_mul(self.page_size.max(0))
    }

    #[must_use]
    pub fn limit(&self) -> i64 {
        self.page_size
    }
}

/// Uniform list envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub total_items: i64,
    pub total_pages: i64,
    pub current_page: i64,
    pub page_size: i64,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total_items: i64, params: PaginationParams) -> Self {
        let total_pages = if total_items <= 0 {
            0
        } else {
            (total_items + params.page_size - 1) / params.page_size
        };
        PagedResult {
            items,
            total_items,
            total_pages,
            current_page: params.page,
            page_size: params.page_size,
        }
    }

    pub fn has_next_page(&self) -> bool {
        self.current_page < self.total_pages
    }

    /// Maps items while keeping the page metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total_items: self.total_items,
            total_pages: self.total_pages,
            current_page: self.current_page,
            page_size: self.page_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_zero_is_rejected() {
        let err = PaginationParams::new(0, 20).validate().unwrap_err();
        assert!(matches!(err, CoreError::InvalidPagination { .. }));
    }

    #[test]
    fn test_page_size_bounds() {
        assert!(PaginationParams::new(1, 0).validate().is_err());
        assert!(PaginationParams::new(1, MAX_PAGE_SIZE + 1).validate().is_err());
        assert!(PaginationParams::new(1, MAX_PAGE_SIZE).validate().is_ok());
        assert!(PaginationParams::new(1, 50).validate_with_max(10).is_err());
    }

    #[test]
    fn test_offset_and_limit() {
        let params = PaginationParams::new(3, 20);
        assert_eq!(params.offset(), 40);
        assert_eq!(params.limit(), 20);
        assert_eq!(PaginationParams::default().offset(), 0);
    }

    #[test]
    fn test_huge_page_is_rejected_not_overflowed() {
        let params = PaginationParams::new(i64::MAX, 20);
        assert!(matches!(
            params.validate().unwrap_err(),
            CoreError::InvalidPagination { .. }
        ));
        assert_eq!(params.offset(), i64::MAX);

        // the largest page whose offset still fits is accepted
        let last = PaginationParams::new(i64::MAX / 20 + 1, 20);
        assert!(last.validate().is_ok());
    }

    #[test]
    fn test_total_pages_rounds_up() {
        let params = PaginationParams::new(1, 10);
        assert_eq!(PagedResult::<i32>::new(vec![], 0, params).total_pages, 0);
        assert_eq!(PagedResult::<i32>::new(vec![], 10, params).total_pages, 1);
        assert_eq!(PagedResult::<i32>::new(vec![], 11, params).total_pages, 2);
    }

    #[test]
    fn test_map_keeps_metadata() {
        let page = PagedResult::new(vec![1, 2], 12, PaginationParams::new(2, 2));
        let mapped = page.map(|n| n * 10);
        assert_eq!(mapped.items, vec![10, 20]);
        assert_eq!(mapped.total_pages, 6);
        assert!(mapped.has_next_page());
    }
}
