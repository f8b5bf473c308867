use serde::Serialize;

/// One page of an in-memory result list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub per_page: usize,
    /// 1-based.
    pub current_page: usize,
    pub last_page: usize,
}

impl<T> Page<T> {
    pub fn empty(per_page: usize) -> Self {
        Self { items: Vec::new(), total: 0, per_page, current_page: 1, last_page: 1 }
    }

    /// Slice page `page` (1-based; 0 is treated as 1) out of `items`.
    pub fn paginate(items: Vec<T>, page: usize, per_page: usize) -> Self {
        let per_page = per_page.max(1);
        let current_page = page.max(1);
        let total = items.len();
        let offset = (current_page - 1).saturating_mul(per_page);
        let items: Vec<T> = items.into_iter().skip(offset).take(per_page).collect();
        let last_page = total.div_ceil(per_page).max(1);
        Self { items, total, per_page, current_page, last_page }
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            per_page: self.per_page,
            current_page: self.current_page,
            last_page: self.last_page,
        }
    }
}
