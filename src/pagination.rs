//! Page-window arithmetic for list screens.

use serde::{Deserialize, Serialize};

/// One computed page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// 1-based, clamped into `1..=total_pages`.
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub offset: usize,
    pub has_more: bool,
}

impl Page {
    /// Bookmark to persist after this page has been rendered.
    pub fn cursor(&self, items_on_page: usize) -> PaginationCursor {
        PaginationCursor {
            offset: self.offset,
            items: items_on_page,
            total: self.total_items,
            page: self.page,
            page_size: self.page_size,
            total_pages: self.total_pages,
        }
    }
}

/// Clamp `requested_page` into range and derive the offset and "has more" flag.
///
/// A zero `page_size` is treated as one item per page.
pub fn paginate(total_count: usize, page_size: usize, requested_page: usize) -> Page {
    let page_size = page_size.max(1);
    let total_pages = total_count.div_ceil(page_size).max(1);
    let page = requested_page.clamp(1, total_pages);
    let offset = (page - 1) * page_size;

    Page {
        page,
        page_size,
        total_pages,
        total_items: total_count,
        offset,
        has_more: offset + page_size < total_count,
    }
}

/// Pagination state persisted in session data between "view more" requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationCursor {
    pub offset: usize,
    /// Items actually shown on the rendered page.
    pub items: usize,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

impl PaginationCursor {
    pub fn next_page(&self) -> usize {
        self.page + 1
    }

    pub fn has_more(&self) -> bool {
        self.offset + self.page_size < self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_has_a_single_page() {
        let page = paginate(0, 10, 5);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.page, 1);
        assert_eq!(page.offset, 0);
        assert!(!page.has_more);
    }

    #[test]
    fn requested_page_is_clamped_to_last() {
        let page = paginate(23, 10, 5);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.page, 3);
        assert_eq!(page.offset, 20);
        assert!(!page.has_more);
    }

    #[test]
    fn page_zero_is_clamped_to_first() {
        let page = paginate(23, 10, 0);
        assert_eq!(page.page, 1);
        assert_eq!(page.offset, 0);
        assert!(page.has_more);
    }

    #[test]
    fn exact_multiple_has_no_trailing_page() {
        let page = paginate(9, 3, 3);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.offset, 6);
        assert!(!page.has_more);

        let middle = paginate(9, 3, 2);
        assert!(middle.has_more);
    }

    #[test]
    fn zero_page_size_does_not_divide_by_zero() {
        let page = paginate(4, 0, 2);
        assert_eq!(page.page_size, 1);
        assert_eq!(page.total_pages, 4);
        assert_eq!(page.offset, 1);
    }

    #[test]
    fn cursor_carries_page_window() {
        let page = paginate(7, 3, 1);
        let cursor = page.cursor(3);
        assert_eq!(cursor.next_page(), 2);
        assert_eq!(cursor.items, 3);
        assert_eq!(cursor.total_pages, 3);
        assert!(cursor.has_more());
    }
}
