//! Page-number pagination for list endpoints.
//!
//! Pages are 1-based. `per_page` is clamped into `[1, MAX_PER_PAGE]` and
//! falls back to [`DEFAULT_PER_PAGE`] when missing or non-positive. An
//! explicit page outside `[1, total_pages]` is an error, and an empty
//! result set still has one (empty) page.

use serde::Serialize;
use std::str::FromStr;
use tessel_types::TxResult;

use crate::error::RpcError;

/// Page size used when `per_page` is absent or not positive.
pub const DEFAULT_PER_PAGE: usize = 30;

/// Largest accepted page size.
pub const MAX_PER_PAGE: usize = 100;

/// Resolve the effective page size.
pub fn validate_per_page(per_page: Option<i64>) -> usize {
    match per_page {
        None => DEFAULT_PER_PAGE,
        Some(n) if n < 1 => DEFAULT_PER_PAGE,
        Some(n) if n > MAX_PER_PAGE as i64 => MAX_PER_PAGE,
        Some(n) => n as usize,
    }
}

/// Number of pages needed for `total` items, never less than 1.
pub fn total_pages(total: usize, per_page: usize) -> usize {
    debug_assert!(per_page >= 1);
    total.div_ceil(per_page).max(1)
}

/// Resolve the requested page. A missing page means the first one.
pub fn validate_page(page: Option<i64>, per_page: usize, total: usize) -> Result<usize, RpcError> {
    let Some(page) = page else {
        return Ok(1);
    };
    let pages = total_pages(total, per_page);
    if page < 1 || page as u64 > pages as u64 {
        return Err(RpcError::PaginationRange { pages, given: page });
    }
    Ok(page as usize)
}

/// Number of items to skip before `page`.
pub fn validate_skip_count(page: usize, per_page: usize) -> usize {
    page.saturating_sub(1).saturating_mul(per_page)
}

/// A resolved page descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Page {
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub total_pages: usize,
    /// Items skipped before this page.
    pub skip: usize,
    /// Items on this page.
    pub len: usize,
}

impl Page {
    pub fn new(page: Option<i64>, per_page: Option<i64>, total: usize) -> Result<Self, RpcError> {
        let per_page = validate_per_page(per_page);
        let page = validate_page(page, per_page, total)?;
        let skip = validate_skip_count(page, per_page);
        Ok(Self {
            page,
            per_page,
            total,
            total_pages: total_pages(total, per_page),
            skip,
            len: total.saturating_sub(skip).min(per_page),
        })
    }

    /// The items belonging to this page.
    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        items.into_iter().skip(self.skip).take(self.len).collect()
    }
}

/// Sort order for search results, by `(height, index)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderBy {
    #[default]
    Asc,
    Desc,
}

impl FromStr for OrderBy {
    type Err = RpcError;

    /// Accepts `asc`, `desc` or an empty string (ascending).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "asc" => Ok(OrderBy::Asc),
            "desc" => Ok(OrderBy::Desc),
            other => Err(RpcError::InvalidOrderToken(other.to_string())),
        }
    }
}

impl OrderBy {
    pub fn sort(self, results: &mut [TxResult]) {
        results.sort_by(|a, b| {
            let ord = (a.height, a.index).cmp(&(b.height, b.index));
            match self {
                OrderBy::Asc => ord,
                OrderBy::Desc => ord.reverse(),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessel_types::{ResponseDeliverTx, Tx};

    fn hit(height: u64, index: u32) -> TxResult {
        TxResult {
            height,
            index,
            tx: Tx::new(vec![height as u8, index as u8]),
            result: ResponseDeliverTx::default(),
        }
    }

    #[test]
    fn per_page_defaults_and_clamps() {
        assert_eq!(validate_per_page(None), DEFAULT_PER_PAGE);
        assert_eq!(validate_per_page(Some(0)), DEFAULT_PER_PAGE);
        assert_eq!(validate_per_page(Some(-5)), DEFAULT_PER_PAGE);
        assert_eq!(validate_per_page(Some(1)), 1);
        assert_eq!(validate_per_page(Some(5000)), MAX_PER_PAGE);
    }

    #[test]
    fn missing_page_is_first() {
        assert_eq!(validate_page(None, 30, 0).unwrap(), 1);
        assert_eq!(validate_page(None, 30, 100).unwrap(), 1);
    }

    #[test]
    fn out_of_range_page_is_rejected() {
        let err = validate_page(Some(5), 30, 100).unwrap_err();
        assert!(matches!(err, RpcError::PaginationRange { pages: 4, given: 5 }));
        let err = validate_page(Some(0), 30, 100).unwrap_err();
        assert!(matches!(err, RpcError::PaginationRange { given: 0, .. }));
    }

    #[test]
    fn empty_results_have_one_page() {
        assert_eq!(validate_page(Some(1), 30, 0).unwrap(), 1);
        let err = validate_page(Some(2), 30, 0).unwrap_err();
        assert_eq!(err.to_string(), "page should be within [1, 1] range, given 2");
    }

    #[test]
    fn last_page_is_partial() {
        let page = Page::new(Some(3), Some(10), 25).unwrap();
        assert_eq!(page.skip, 20);
        assert_eq!(page.len, 5);
        let items: Vec<u32> = (0..25).collect();
        assert_eq!(page.slice(items), vec![20, 21, 22, 23, 24]);
    }

    #[test]
    fn skip_count_never_underflows() {
        assert_eq!(validate_skip_count(0, 30), 0);
        assert_eq!(validate_skip_count(1, 30), 0);
        assert_eq!(validate_skip_count(2, 30), 30);
    }

    #[test]
    fn order_tokens() {
        assert_eq!("".parse::<OrderBy>().unwrap(), OrderBy::Asc);
        assert_eq!("asc".parse::<OrderBy>().unwrap(), OrderBy::Asc);
        assert_eq!("desc".parse::<OrderBy>().unwrap(), OrderBy::Desc);
        assert!(matches!(
            "DESC".parse::<OrderBy>(),
            Err(RpcError::InvalidOrderToken(t)) if t == "DESC"
        ));
    }

    #[test]
    fn sort_orders_by_height_then_index() {
        let mut hits = vec![hit(2, 0), hit(1, 1), hit(1, 0), hit(3, 2)];
        OrderBy::Desc.sort(&mut hits);
        let keys: Vec<_> = hits.iter().map(|h| (h.height, h.index)).collect();
        assert_eq!(keys, vec![(3, 2), (2, 0), (1, 1), (1, 0)]);
        OrderBy::Asc.sort(&mut hits);
        let keys: Vec<_> = hits.iter().map(|h| (h.height, h.index)).collect();
        assert_eq!(keys, vec![(1, 0), (1, 1), (2, 0), (3, 2)]);
    }
}
