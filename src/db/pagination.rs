use serde::Serialize;

pub const ADMIN_PAGE_SIZE: u32 = 15;

/// Number of page links shown around the current page.
const WINDOW: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    pub fn new(page: Option<u32>, per_page: u32) -> Self {
        Self {
            page: page.filter(|p| *p > 0).unwrap_or(1),
            per_page: per_page.max(1),
        }
    }

    /// Clamps the requested page into `1..=total_pages` for `total_items`.
    pub fn clamp(self, total_items: u64) -> Self {
        let last = total_pages(total_items, self.per_page);
        Self {
            page: self.page.min(last),
            ..self
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub current_page: u32,
    pub total_pages: u32,
    pub total_items: u64,
    pub page_range: Vec<u32>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total_items: u64) -> Self {
        let total_pages = total_pages(total_items, request.per_page);
        Self {
            items,
            current_page: request.page,
            total_pages,
            total_items,
            page_range: page_window(request.page, total_pages),
        }
    }

    /// Pages an already-filtered in-memory list.
    pub fn from_vec(all: Vec<T>, request: PageRequest) -> Self {
        let total = all.len() as u64;
        let request = request.clamp(total);
        let items = all
            .into_iter()
            .skip(request.offset() as usize)
            .take(request.per_page as usize)
            .collect();
        Self::new(items, request, total)
    }
}

/// An empty list still has one (empty) page.
pub fn total_pages(total_items: u64, per_page: u32) -> u32 {
    let per_page = u64::from(per_page.max(1));
    (total_items.div_ceil(per_page)).max(1) as u32
}

/// Up to five page numbers centred on `current`, shifted at either edge.
pub fn page_window(current: u32, total: u32) -> Vec<u32> {
    let total = total.max(1);
    let current = current.clamp(1, total);

    let mut start = current.saturating_sub(2).max(1);
    let mut end = (current + 2).min(total);

    if end - start < WINDOW - 1 {
        if start == 1 {
            end = (start + WINDOW - 1).min(total);
        } else if end == total {
            start = end.saturating_sub(WINDOW - 1).max(1);
        }
    }

    (start..=end).collect()
}
