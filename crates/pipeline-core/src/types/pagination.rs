//! Pagination types: offset pages for service results, page windows for
//! numbered list views, and the ellipsis page range.

use serde::{Deserialize, Serialize, Serializer};

/// Offset/limit slice returned by list and search operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffsetPage<T> {
    pub results: Vec<T>,
    pub total_count: u64,
    pub limit: usize,
    pub offset: usize,
    pub has_more: bool,
}

impl<T> OffsetPage<T> {
    pub fn new(results: Vec<T>, total_count: u64, limit: usize, offset: usize) -> Self {
        Self {
            has_more: ((offset + limit) as u64) < total_count,
            results,
            total_count,
            limit,
            offset,
        }
    }

    /// Map the page items, keeping the slice metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> OffsetPage<U> {
        OffsetPage {
            results: self.results.into_iter().map(f).collect(),
            total_count: self.total_count,
            limit: self.limit,
            offset: self.offset,
            has_more: self.has_more,
        }
    }
}

/// Splits `count` items into numbered pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    pub count: usize,
    pub per_page: usize,
    /// Trailing items folded into the last page instead of starting a new one.
    pub orphans: usize,
    pub allow_empty_first_page: bool,
}

impl Paginator {
    pub fn new(count: usize, per_page: usize) -> Self {
        Self {
            count,
            per_page: per_page.max(1),
            orphans: 0,
            allow_empty_first_page: true,
        }
    }

    pub fn with_orphans(mut self, orphans: usize) -> Self {
        self.orphans = orphans;
        self
    }

    pub fn allow_empty_first_page(mut self, allow: bool) -> Self {
        self.allow_empty_first_page = allow;
        self
    }

    pub fn num_pages(&self) -> usize {
        if self.count == 0 && !self.allow_empty_first_page {
            return 0;
        }
        let hits = self.count.saturating_sub(self.orphans).max(1);
        hits.div_ceil(self.per_page)
    }

    /// Whether `number` addresses an existing page.
    pub fn is_valid(&self, number: i64) -> bool {
        if number < 1 {
            return false;
        }
        let pages = self.num_pages() as i64;
        number <= pages || (number == 1 && self.allow_empty_first_page)
    }

    /// Resolve a raw page parameter.
    ///
    /// A missing or non-numeric value means page 1. A number outside the
    /// page range (including zero and negatives) means the last page.
    pub fn window(&self, raw: Option<&str>) -> PageWindow {
        let number = match raw.map(str::trim).map(str::parse::<i64>) {
            None => 1,
            Some(Err(_)) => 1,
            Some(Ok(n)) if self.is_valid(n) => n as usize,
            Some(Ok(_)) => self.num_pages().max(1),
        };
        self.page(number)
    }

    /// Page window for an already-validated number.
    pub fn page(&self, number: usize) -> PageWindow {
        let number = number.max(1);
        let offset = ((number - 1) * self.per_page).min(self.count);
        let mut end = offset + self.per_page;
        if end + self.orphans >= self.count {
            end = self.count;
        }
        PageWindow {
            number,
            num_pages: self.num_pages(),
            count: self.count,
            per_page: self.per_page,
            offset,
            len: end.saturating_sub(offset),
        }
    }
}

/// One page of a [`Paginator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageWindow {
    pub number: usize,
    pub num_pages: usize,
    pub count: usize,
    pub per_page: usize,
    /// Index of the first item on the page.
    pub offset: usize,
    /// Number of items on the page.
    pub len: usize,
}

impl PageWindow {
    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn next_page_number(&self) -> Option<usize> {
        self.has_next().then_some(self.number + 1)
    }

    pub fn previous_page_number(&self) -> Option<usize> {
        self.has_previous().then_some(self.number - 1)
    }

    /// 1-based index of the first item, or 0 for an empty list.
    pub fn start_index(&self) -> usize {
        if self.count == 0 { 0 } else { self.offset + 1 }
    }

    /// 1-based index of the last item.
    pub fn end_index(&self) -> usize {
        if self.number >= self.num_pages {
            self.count
        } else {
            self.number * self.per_page
        }
    }
}

/// Entry of a numbered page range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRangeItem {
    Page(usize),
    /// Rendered as `"..."`.
    Ellipsis,
}

impl Serialize for PageRangeItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Page(n) => serializer.serialize_u64(*n as u64),
            Self::Ellipsis => serializer.serialize_str("..."),
        }
    }
}

/// Page numbers to display around `current`, with ellipsis markers.
///
/// Short ranges (`total <= 2 * delta + 5`) list every page. Longer ranges
/// keep the first page, the last page and a `delta`-wide window around
/// `current`, with one ellipsis per gap.
pub fn page_range(current: usize, total: usize, delta: usize) -> Vec<PageRangeItem> {
    if total <= 1 {
        return Vec::new();
    }
    if total <= delta * 2 + 5 {
        return (1..=total).map(PageRangeItem::Page).collect();
    }

    let left = current as i64 - delta as i64;
    let right = (current + delta + 1) as i64;
    let mut range = Vec::new();
    let mut last = 0usize;

    for page in 1..=total {
        let p = page as i64;
        if page == 1 || page == total || (left <= p && p < right) {
            if last != 0 && page - last > 1 {
                range.push(PageRangeItem::Ellipsis);
            }
            range.push(PageRangeItem::Page(page));
            last = page;
        }
    }
    range
}

#[cfg(test)]
mod tests {
    use super::*;
    use PageRangeItem::{Ellipsis, Page};

    #[test]
    fn test_page_range_middle_of_long_list() {
        assert_eq!(
            page_range(10, 20, 2),
            vec![
                Page(1),
                Ellipsis,
                Page(8),
                Page(9),
                Page(10),
                Page(11),
                Page(12),
                Ellipsis,
                Page(20),
            ]
        );
    }

    #[test]
    fn test_page_range_short_list_has_no_ellipsis() {
        for current in 1..=5 {
            assert_eq!(page_range(current, 5, 2), (1..=5).map(Page).collect::<Vec<_>>());
        }
        assert!(page_range(1, 1, 2).is_empty());
    }

    #[test]
    fn test_page_range_near_edges() {
        assert_eq!(
            page_range(1, 20, 2),
            vec![Page(1), Page(2), Page(3), Ellipsis, Page(20)]
        );
        assert_eq!(
            page_range(20, 20, 2),
            vec![Page(1), Ellipsis, Page(18), Page(19), Page(20)]
        );
    }

    #[test]
    fn test_page_range_serializes_ellipsis_as_string() {
        let json = serde_json::to_value(page_range(10, 20, 2)).unwrap();
        assert_eq!(json[1], "...");
        assert_eq!(json[2], 8);
    }

    #[test]
    fn test_window_clamps_out_of_range_to_last_page() {
        let paginator = Paginator::new(25, 10);
        assert_eq!(paginator.window(Some("99")).number, 3);
        assert_eq!(paginator.window(Some("0")).number, 3);
        assert_eq!(paginator.window(Some("abc")).number, 1);
        assert_eq!(paginator.window(None).number, 1);
    }

    #[test]
    fn test_window_indices() {
        let last = Paginator::new(25, 10).window(Some("3"));
        assert_eq!((last.offset, last.len), (20, 5));
        assert_eq!((last.start_index(), last.end_index()), (21, 25));
        assert!(!last.has_next());
        assert_eq!(last.previous_page_number(), Some(2));
    }

    #[test]
    fn test_orphans_fold_into_last_page() {
        let paginator = Paginator::new(21, 10).with_orphans(1);
        assert_eq!(paginator.num_pages(), 2);
        assert_eq!(paginator.page(2).len, 11);
    }

    #[test]
    fn test_empty_list_still_has_first_page() {
        let window = Paginator::new(0, 10).window(Some("4"));
        assert_eq!(window.number, 1);
        assert_eq!(window.len, 0);
        assert_eq!(window.start_index(), 0);
    }

    #[test]
    fn test_offset_page_has_more() {
        let page = OffsetPage::new(vec![1, 2], 5, 2, 2);
        assert!(page.has_more);
        let page = OffsetPage::new(vec![5], 5, 2, 4);
        assert!(!page.has_more);
    }
}
