//! Page arithmetic for the job lists.
//!
//! Pages are 1-based. Requests outside the valid range are clamped rather
//! than rejected: this drives keyboard navigation, not an API.

pub const PAGE_SIZE: usize = 9;

pub fn total_pages(len: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    len.div_ceil(page_size)
}

/// Returns the items on `page`, or an empty slice when the page does not exist.
pub fn visible_slice<T>(items: &[T], page: usize, page_size: usize) -> &[T] {
    if page == 0 || page > total_pages(items.len(), page_size) {
        return &[];
    }
    let start = (page - 1) * page_size;
    let end = (start + page_size).min(items.len());
    &items[start..end]
}

/// Clamps a requested page into `[1, total]`. An empty collection still has
/// page 1 so the view has somewhere to stand.
pub fn clamp_page(page: usize, total: usize) -> usize {
    page.clamp(1, total.max(1))
}

/// Current page of one job list. Each list view owns its own cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    page: usize,
    page_size: usize,
}

impl Default for PageCursor {
    fn default() -> Self {
        Self::new(PAGE_SIZE)
    }
}

impl PageCursor {
    pub fn new(page_size: usize) -> Self {
        Self { page: 1, page_size }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn total_pages(&self, len: usize) -> usize {
        total_pages(len, self.page_size)
    }

    pub fn reset(&mut self) {
        self.page = 1;
    }

    pub fn go_to(&mut self, page: usize, len: usize) {
        self.page = clamp_page(page, self.total_pages(len));
    }

    pub fn next(&mut self, len: usize) {
        self.go_to(self.page.saturating_add(1), len);
    }

    pub fn prev(&mut self, len: usize) {
        self.go_to(self.page.saturating_sub(1), len);
    }

    /// Re-clamps after the underlying collection changed size.
    pub fn sync(&mut self, len: usize) {
        self.go_to(self.page, len);
    }

    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        visible_slice(items, self.page, self.page_size)
    }
}
