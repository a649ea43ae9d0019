//! Page-number pagination shared by every post listing.
//!
//! The arithmetic lives here, away from HTTP and SQL, so listings only have
//! to supply a total count and fetch the `offset`/`limit` window it returns.

use serde::Serialize;

/// Number of posts shown on one page of any listing.
pub const POSTS_PER_PAGE: u32 = 10;

/// Resolved position of one page inside a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageWindow {
    pub number: u32,
    pub total_pages: u32,
    pub total_items: u64,
    pub offset: u64,
    pub limit: u32,
}

impl PageWindow {
    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.total_pages
    }
}

/// Interpret the raw `page` query value.
///
/// Missing, non-numeric and non-positive values all mean the first page.
pub fn parse_page_number(raw: Option<&str>) -> u32 {
    raw.and_then(|value| value.trim().parse::<u32>().ok())
        .filter(|number| *number >= 1)
        .unwrap_or(1)
}

/// Compute the window for `requested` within `total_items`.
///
/// A request past the end resolves to the last page; an empty collection
/// still has one (empty) page.
pub fn paginate(total_items: u64, requested: u32, page_size: u32) -> PageWindow {
    let page_size = page_size.max(1);
    let size = u64::from(page_size);
    let total_pages = total_items.div_ceil(size).max(1);
    let total_pages = u32::try_from(total_pages).unwrap_or(u32::MAX);
    let number = requested.clamp(1, total_pages);
    let offset = u64::from(number - 1) * size;

    PageWindow {
        number,
        total_pages,
        total_items,
        offset,
        limit: page_size,
    }
}

/// One page of items together with its navigation metadata.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub window: PageWindow,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, window: PageWindow) -> Self {
        Self { items, window }
    }

    pub fn number(&self) -> u32 {
        self.window.number
    }

    pub fn total_pages(&self) -> u32 {
        self.window.total_pages
    }

    pub fn total_items(&self) -> u64 {
        self.window.total_items
    }

    pub fn has_previous(&self) -> bool {
        self.window.has_previous()
    }

    pub fn has_next(&self) -> bool {
        self.window.has_next()
    }

    pub fn previous_number(&self) -> u32 {
        self.window.number.saturating_sub(1).max(1)
    }

    pub fn next_number(&self) -> u32 {
        (self.window.number + 1).min(self.window.total_pages)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            window: self.window,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sixteen_items_split_ten_and_six() {
        let first = paginate(16, 1, POSTS_PER_PAGE);
        assert_eq!(first.total_pages, 2);
        assert_eq!(first.offset, 0);
        assert!(!first.has_previous());
        assert!(first.has_next());

        let second = paginate(16, 2, POSTS_PER_PAGE);
        assert_eq!(second.offset, 10);
        assert_eq!(16 - second.offset, 6);
        assert!(second.has_previous());
        assert!(!second.has_next());
    }

    #[test]
    fn total_pages_is_ceiling_of_count() {
        for (count, pages) in [(1, 1), (10, 1), (11, 2), (20, 2), (21, 3), (100, 10)] {
            assert_eq!(paginate(count, 1, POSTS_PER_PAGE).total_pages, pages, "{count}");
        }
    }

    #[test]
    fn empty_collection_has_single_empty_page() {
        let window = paginate(0, 1, POSTS_PER_PAGE);
        assert_eq!(window.number, 1);
        assert_eq!(window.total_pages, 1);
        assert_eq!(window.offset, 0);
        assert!(!window.has_next());
        assert!(!window.has_previous());
    }

    #[test]
    fn page_past_the_end_resolves_to_last_page() {
        let window = paginate(25, 9, POSTS_PER_PAGE);
        assert_eq!(window.number, 3);
        assert_eq!(window.offset, 20);
    }

    #[test]
    fn invalid_page_values_mean_first_page() {
        assert_eq!(parse_page_number(None), 1);
        assert_eq!(parse_page_number(Some("")), 1);
        assert_eq!(parse_page_number(Some("abc")), 1);
        assert_eq!(parse_page_number(Some("0")), 1);
        assert_eq!(parse_page_number(Some("-4")), 1);
        assert_eq!(parse_page_number(Some(" 3 ")), 3);
    }

    #[test]
    fn page_navigation_numbers() {
        let page = Page::new(vec![1, 2], paginate(30, 2, POSTS_PER_PAGE));
        assert_eq!(page.previous_number(), 1);
        assert_eq!(page.next_number(), 3);
        let mapped = page.map(|value| value * 10);
        assert_eq!(mapped.items, vec![10, 20]);
        assert_eq!(mapped.number(), 2);
    }
}
