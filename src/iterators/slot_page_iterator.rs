use crate::storage::{page::page::HeapPage, tuple::Tuple};

/// Walks the live slots of one page in ascending order.
pub struct SlottedPageIterator<'a> {
    page: &'a HeapPage,
    index: usize,
}

impl<'a> SlottedPageIterator<'a> {
    pub fn create(page: &'a HeapPage) -> Self {
        Self { page, index: 0 }
    }
}

impl<'a> Iterator for SlottedPageIterator<'a> {
    type Item = (usize, Tuple);

    fn next(&mut self) -> Option<Self::Item> {
        while self.index < self.page.slot_count() {
            let slot = self.index;
            self.index += 1;

            if let Some(tuple) = self.page.tuple(slot) {
                return Some((slot, tuple));
            }
        }

        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.page.slot_count() - self.index))
    }
}
