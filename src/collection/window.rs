/// Growing prefix over the filtered notes ("load more").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadMoreWindow {
    loaded: usize,
    total: usize,
    page_size: usize,
}

impl LoadMoreWindow {
    pub fn new(total: usize, page_size: usize) -> Self {
        let mut window = Self::default();
        window.reset(total, page_size);
        window
    }

    /// Starts over at the first page. Called after every change to the
    /// filtered set or the layout; never rescales the previous window.
    pub fn reset(&mut self, total: usize, page_size: usize) {
        self.total = total;
        self.page_size = page_size;
        self.loaded = total.min(page_size);
    }

    /// Reveals one more page. Returns `false` when already at the end.
    pub fn load_more(&mut self) -> bool {
        if self.loaded >= self.total || self.page_size == 0 {
            return false;
        }
        self.loaded = self.total.min(self.loaded + self.page_size);
        true
    }

    pub fn loaded(&self) -> usize {
        self.loaded
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn has_more(&self) -> bool {
        self.loaded < self.total
    }

    pub fn remaining(&self) -> usize {
        self.total - self.loaded
    }
}
