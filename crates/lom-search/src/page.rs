//! Result pagination.
//!
//! Pages are 1-based. A search with no hits still has one (empty) page, so
//! `first` and `last` are always valid links. Asking for a page past the end
//! yields an empty slice rather than an error: a consumer can always restart
//! from `first`.

use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    /// The requested page number.
    pub number: usize,
    pub page_size: usize,
    /// Total hits across all pages.
    pub total: usize,
    /// Number of the last page (at least 1).
    pub last: usize,
}

impl PageInfo {
    pub fn new(total: usize, page_size: usize, number: usize) -> Self {
        let page_size = page_size.max(1);
        let last = total.div_ceil(page_size).max(1);
        Self {
            number,
            page_size,
            total,
            last,
        }
    }

    pub fn previous(&self) -> Option<usize> {
        (self.number > 1).then(|| (self.number - 1).min(self.last))
    }

    pub fn next(&self) -> Option<usize> {
        (self.number < self.last).then_some(self.number + 1)
    }
}

/// Slice `hits` down to page `number`.
pub fn paginate<T>(hits: Vec<T>, page_size: usize, number: usize) -> (Vec<T>, PageInfo) {
    let info = PageInfo::new(hits.len(), page_size, number);
    let start = number.saturating_sub(1).saturating_mul(info.page_size);
    let page = hits.into_iter().skip(start).take(info.page_size).collect();
    (page, info)
}

/// Parse a `page=<n>` path segment. `n` must be a positive integer.
pub fn parse_page_segment(segment: &str) -> Option<usize> {
    let n: usize = segment.strip_prefix("page=")?.parse().ok()?;
    (n >= 1).then_some(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_result_has_one_page() {
        let (page, info) = paginate(Vec::<u32>::new(), 25, 1);
        assert!(page.is_empty());
        assert_eq!(info.last, 1);
        assert_eq!(info.previous(), None);
        assert_eq!(info.next(), None);
    }

    #[test]
    fn middle_page_links_both_ways() {
        let hits: Vec<u32> = (1..=7).collect();
        let (page, info) = paginate(hits, 3, 2);
        assert_eq!(page, vec![4, 5, 6]);
        assert_eq!(info.last, 3);
        assert_eq!(info.previous(), Some(1));
        assert_eq!(info.next(), Some(3));
    }

    #[test]
    fn last_page_is_partial() {
        let hits: Vec<u32> = (1..=7).collect();
        let (page, info) = paginate(hits, 3, 3);
        assert_eq!(page, vec![7]);
        assert_eq!(info.next(), None);
    }

    #[test]
    fn past_the_end_is_empty_and_points_back() {
        let hits: Vec<u32> = (1..=4).collect();
        let (page, info) = paginate(hits, 3, 9);
        assert!(page.is_empty());
        assert_eq!(info.previous(), Some(2));
        assert_eq!(info.next(), None);
    }

    #[test]
    fn page_segment_parsing() {
        assert_eq!(parse_page_segment("page=1"), Some(1));
        assert_eq!(parse_page_segment("page=12"), Some(12));
        assert_eq!(parse_page_segment("page=0"), None);
        assert_eq!(parse_page_segment("page=-1"), None);
        assert_eq!(parse_page_segment("page="), None);
        assert_eq!(parse_page_segment("p=1"), None);
    }
}
