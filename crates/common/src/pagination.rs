//! Offset pagination shared by every list operation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Page size used when the caller gives none, or an invalid one.
pub const DEFAULT_PAGE_LIMIT: u32 = 10;

/// Upper bound on the page size a caller may request.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// A 1-based page request.
///
/// Values are normalized on construction: a page below 1 becomes 1, a limit
/// below 1 falls back to [`DEFAULT_PAGE_LIMIT`], and a limit above
/// [`MAX_PAGE_LIMIT`] is capped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    /// Creates a normalized page request.
    pub fn new(page: i64, limit: i64) -> Self {
        let page = if page < 1 {
            1
        } else {
            u32::try_from(page).unwrap_or(u32::MAX)
        };
        let limit = if limit < 1 {
            DEFAULT_PAGE_LIMIT
        } else {
            u32::try_from(limit)
                .unwrap_or(MAX_PAGE_LIMIT)
                .min(MAX_PAGE_LIMIT)
        };
        Self { page, limit }
    }

    /// Builds a request from optional query values.
    pub fn from_query(page: Option<i64>, limit: Option<i64>) -> Self {
        Self::new(page.unwrap_or(1), limit.unwrap_or(i64::from(DEFAULT_PAGE_LIMIT)))
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Number of rows to skip: `(page - 1) * limit`.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

/// One page of results plus the total row count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

impl<T> Page<T> {
    /// Assembles a page from already-sliced items.
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            page: request.page(),
            limit: request.limit(),
        }
    }

    /// Slices an in-memory, already ordered collection.
    pub fn from_slice(all: &[T], request: PageRequest) -> Self
    where
        T: Clone,
    {
        let start = usize::try_from(request.offset()).unwrap_or(usize::MAX);
        let items = all
            .iter()
            .skip(start)
            .take(request.limit() as usize)
            .cloned()
            .collect();
        Self::new(items, all.len() as u64, request)
    }

    /// Converts each item, keeping the page metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_page_and_limit() {
        let req = PageRequest::new(0, 0);
        assert_eq!(req.page(), 1);
        assert_eq!(req.limit(), DEFAULT_PAGE_LIMIT);

        let req = PageRequest::new(-3, 5000);
        assert_eq!(req.page(), 1);
        assert_eq!(req.limit(), MAX_PAGE_LIMIT);
    }

    #[test]
    fn offset_is_zero_based() {
        assert_eq!(PageRequest::new(1, 10).offset(), 0);
        assert_eq!(PageRequest::new(3, 7).offset(), 14);
    }

    #[test]
    fn from_query_defaults() {
        let req = PageRequest::from_query(None, None);
        assert_eq!(req, PageRequest::default());
    }

    #[test]
    fn pages_reconstruct_the_full_set() {
        let all: Vec<u32> = (0..23).collect();
        let mut collected = Vec::new();
        for page in 1..=3 {
            let p = Page::from_slice(&all, PageRequest::new(page, 10));
            assert!(p.items.len() <= 10);
            assert_eq!(p.total, 23);
            collected.extend(p.items);
        }
        assert_eq!(collected, all);
    }

    #[test]
    fn page_past_the_end_is_empty() {
        let all = vec![1, 2, 3];
        let p = Page::from_slice(&all, PageRequest::new(5, 10));
        assert!(p.items.is_empty());
        assert_eq!(p.total, 3);
    }
}
