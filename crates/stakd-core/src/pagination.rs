//! Paginated list envelope.

use serde::{Deserialize, Serialize};

/// Default page size when a caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// One page of a collection, as returned by `GET /{entity}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T> {
    /// Items on this page.
    pub data: Vec<T>,
    /// Total number of matching items across all pages.
    pub total: u64,
    /// 1-based page number.
    pub page: u32,
    /// Page size.
    pub limit: u32,
    /// Number of pages.
    pub total_pages: u32,
    /// Whether a later page exists.
    pub has_more: bool,
}

/// Pagination metadata without the items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// Total number of matching items.
    pub total: u64,
    /// 1-based page number.
    pub page: u32,
    /// Page size.
    pub limit: u32,
    /// Number of pages.
    pub total_pages: u32,
    /// Whether a later page exists.
    pub has_more: bool,
}

impl<T> PaginatedResponse<T> {
    /// Cuts one page out of a full, already-filtered result set.
    ///
    /// `page` is 1-based; `0` is treated as `1`. A `limit` of `0` falls back
    /// to [`DEFAULT_PAGE_SIZE`].
    pub fn paginate(items: Vec<T>, page: u32, limit: u32) -> Self {
        let page = page.max(1);
        let limit = if limit == 0 { DEFAULT_PAGE_SIZE } else { limit };
        let total = items.len() as u64;
        let total_pages = total.div_ceil(u64::from(limit)) as u32;
        let start = (u64::from(page - 1) * u64::from(limit)).min(total) as usize;

        let data: Vec<T> = items.into_iter().skip(start).take(limit as usize).collect();

        Self {
            data,
            total,
            page,
            limit,
            total_pages,
            has_more: page < total_pages,
        }
    }

    /// An empty first page.
    pub fn empty(limit: u32) -> Self {
        Self::paginate(Vec::new(), 1, limit)
    }

    /// Pagination metadata for this page.
    pub fn page_info(&self) -> PageInfo {
        PageInfo {
            total: self.total,
            page: self.page,
            limit: self.limit,
            total_pages: self.total_pages,
            has_more: self.has_more,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_second_page_of_fifteen() {
        let page = PaginatedResponse::paginate((0..15).collect::<Vec<_>>(), 2, 10);
        assert_eq!(page.data, vec![10, 11, 12, 13, 14]);
        assert_eq!(page.total, 15);
        assert_eq!(page.total_pages, 2);
        assert!(!page.has_more);
    }

    #[test]
    fn test_first_page_has_more() {
        let page = PaginatedResponse::paginate((0..15).collect::<Vec<_>>(), 1, 10);
        assert_eq!(page.data.len(), 10);
        assert!(page.has_more);
    }

    #[test]
    fn test_page_past_end_is_empty() {
        let page = PaginatedResponse::paginate(vec![1, 2, 3], 5, 2);
        assert!(page.data.is_empty());
        assert_eq!(page.total_pages, 2);
        assert!(!page.has_more);
    }

    #[test]
    fn test_zero_page_and_limit_defaults() {
        let page = PaginatedResponse::paginate((0..25).collect::<Vec<_>>(), 0, 0);
        assert_eq!(page.page, 1);
        assert_eq!(page.limit, DEFAULT_PAGE_SIZE);
        assert_eq!(page.data.len(), 10);
    }

    #[test]
    fn test_wire_names_are_camel_case() {
        let page = PaginatedResponse::paginate(vec!["a"], 1, 10);
        let value = serde_json::to_value(&page).unwrap();
        assert_eq!(value["totalPages"], 1);
        assert_eq!(value["hasMore"], false);
    }

    proptest! {
        #[test]
        fn prop_pages_partition_the_items(len in 0usize..200, limit in 1u32..30) {
            let items: Vec<usize> = (0..len).collect();
            let first = PaginatedResponse::paginate(items.clone(), 1, limit);
            let mut seen = Vec::new();
            for page in 1..=first.total_pages.max(1) {
                let p = PaginatedResponse::paginate(items.clone(), page, limit);
                prop_assert!(p.data.len() <= limit as usize);
                prop_assert_eq!(p.has_more, page < first.total_pages);
                seen.extend(p.data);
            }
            prop_assert_eq!(seen, items);
        }
    }
}
