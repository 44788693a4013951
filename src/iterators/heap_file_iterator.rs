use std::{sync::Arc, vec};

use tracing::trace;

use crate::{
    buffer::buffer_pool_manager::BufferPool,
    error::{StorageError, StorageResult},
    storage::{disk::heap_file::HeapFile, page::page_id::PageId, tuple::Tuple},
    transaction::TransactionId,
};

use super::iterator::DbFileIterator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Unopened,
    Scanning,
    Exhausted,
    Closed,
}

/// Sequential scan of a heap file on behalf of one transaction.
///
/// Only a page cursor and the live tuples of the current page are held. The
/// page guard is dropped as soon as those tuples are copied out, which leaves
/// the pool free to evict the page while the scan is still reading it.
pub struct HeapFileIterator {
    file: Arc<HeapFile>,
    pool: Arc<BufferPool>,
    txn: TransactionId,

    state: ScanState,
    next_page_number: u32,
    current: Option<vec::IntoIter<Tuple>>,
}

impl HeapFileIterator {
    pub fn new(file: Arc<HeapFile>, pool: Arc<BufferPool>, txn: TransactionId) -> Self {
        Self {
            file,
            pool,
            txn,
            state: ScanState::Unopened,
            next_page_number: 0,
            current: None,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Adapts the scan to a std iterator. The scan must already be open.
    pub fn tuples(&mut self) -> impl Iterator<Item = StorageResult<Tuple>> + '_ {
        std::iter::from_fn(move || match self.has_next() {
            Ok(true) => Some(DbFileIterator::next(self)),
            Ok(false) => None,
            Err(err) => Some(Err(err)),
        })
    }

    fn load_page(&self, page_number: u32) -> StorageResult<vec::IntoIter<Tuple>> {
        let page_id = PageId::new(self.file.table_id(), page_number);
        let guard = self.pool.read_page(self.txn, page_id)?;

        let tuples: Vec<Tuple> = guard.read().tuples().map(|(_, tuple)| tuple).collect();
        trace!(%page_id, tuples = tuples.len(), "scan loaded page");

        Ok(tuples.into_iter())
    }

    fn has_buffered(&self) -> bool {
        self.current
            .as_ref()
            .map_or(false, |tuples| !tuples.as_slice().is_empty())
    }
}

impl DbFileIterator for HeapFileIterator {
    fn open(&mut self) -> StorageResult<()> {
        self.current = None;
        self.next_page_number = 0;
        self.state = ScanState::Unopened;

        if self.file.num_pages()? == 0 {
            self.state = ScanState::Exhausted;
            return Err(StorageError::DbAccess {
                table_id: self.file.table_id(),
                reason: String::from("table has no pages"),
            });
        }

        self.current = Some(self.load_page(0)?);
        self.next_page_number = 1;
        self.state = ScanState::Scanning;
        Ok(())
    }

    fn has_next(&mut self) -> StorageResult<bool> {
        if self.state != ScanState::Scanning {
            return Ok(false);
        }

        loop {
            if self.has_buffered() {
                return Ok(true);
            }

            // Re-read every time, the file may have grown since the scan opened
            if self.next_page_number >= self.file.num_pages()? {
                self.current = None;
                self.state = ScanState::Exhausted;
                return Ok(false);
            }

            self.current = Some(self.load_page(self.next_page_number)?);
            self.next_page_number += 1;
        }
    }

    fn next(&mut self) -> StorageResult<Tuple> {
        if !self.has_next()? {
            return Err(StorageError::NoSuchElement);
        }

        self.current
            .as_mut()
            .and_then(|tuples| tuples.next())
            .ok_or(StorageError::NoSuchElement)
    }

    fn close(&mut self) {
        self.current = None;
        self.state = ScanState::Closed;
    }
}
