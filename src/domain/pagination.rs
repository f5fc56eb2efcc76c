use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Page sizes offered by the page-size selector.
pub const PAGE_SIZE_OPTIONS: [u32; 4] = [5, 10, 20, 50];

const MAX_VISIBLE_PAGES: u32 = 5;

/// The currently displayed page of the collection.
///
/// Always satisfies `1 <= page <= max(total_pages, 1)`, with `has_next` and
/// `has_prev` derived from `page` and `total_pages`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationState {
    pub page: u32,
    pub limit: u32,
    pub total: u32,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Default for PaginationState {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
            total: 0,
            total_pages: 0,
            has_next: false,
            has_prev: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageItem {
    Page(u32),
    Gap,
}

impl PaginationState {
    /// Combine the server-reported position with the locally known page size.
    pub fn from_server(current_page: u32, total_pages: u32, total: u32, limit: u32) -> Self {
        let page = current_page.clamp(1, total_pages.max(1));

        Self {
            page,
            limit,
            total,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }

    /// Whether a server-reported page lies past the last page that has items.
    pub fn overshoots(current_page: u32, total_pages: u32) -> bool {
        current_page > total_pages.max(1)
    }

    /// 1-based bounds of the items on this page, for "Showing a-b of n".
    pub fn item_range(&self) -> Option<(u32, u32)> {
        if self.total == 0 || self.limit == 0 {
            return None;
        }

        let start = (self.page - 1).saturating_mul(self.limit).saturating_add(1);
        if start > self.total {
            return None;
        }
        let end = self.page.saturating_mul(self.limit).min(self.total);
        Some((start, end))
    }

    /// Page buttons to show: every page when there are few, otherwise the first
    /// and last page around a window of the current page's neighbours.
    pub fn page_window(&self) -> Vec<PageItem> {
        let total_pages = self.total_pages;
        if total_pages <= MAX_VISIBLE_PAGES {
            return (1..=total_pages).map(PageItem::Page).collect();
        }

        let page = self.page;
        let mut start = page.saturating_sub(1).max(2);
        let mut end = (page + 1).min(total_pages - 1);

        if page <= 3 {
            end = 4;
        }
        if page >= total_pages - 2 {
            start = total_pages - 3;
        }

        let mut items = vec![PageItem::Page(1)];
        if start > 2 {
            items.push(PageItem::Gap);
        }
        items.extend((start..=end).map(PageItem::Page));
        if end < total_pages - 1 {
            items.push(PageItem::Gap);
        }
        items.push(PageItem::Page(total_pages));
        items
    }
}
