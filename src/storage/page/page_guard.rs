use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{
    buffer::buffer_pool_manager::BufferPool,
    transaction::{Permission, TransactionId},
};

use super::{page::HeapPage, page_id::PageId};

/// A cached page plus the bookkeeping the pool needs to decide on eviction.
pub struct FrameHeader {
    pub(crate) page: RwLock<HeapPage>,
    pub(crate) pin_count: AtomicU32,
    // Transaction whose changes are not yet on disk
    pub(crate) dirtied_by: Mutex<Option<TransactionId>>,
}

impl FrameHeader {
    pub(crate) fn new(page: HeapPage) -> Self {
        Self {
            page: RwLock::new(page),
            pin_count: AtomicU32::new(0),
            dirtied_by: Mutex::new(None),
        }
    }

    // Only called with the pool's state mutex held, pins are taken under the same mutex
    pub(crate) fn is_evictable(&self) -> bool {
        self.pin_count.load(Ordering::Acquire) == 0 && self.dirtied_by.lock().is_none()
    }

    pub(crate) fn dirtied_by(&self) -> Option<TransactionId> {
        *self.dirtied_by.lock()
    }
}

pub enum PageGuard<'a> {
    WriteGuard(WriteGuard<'a>),
    ReadGuard(ReadGuard),
}

impl<'a> PageGuard<'a> {
    pub(crate) fn new(
        pool: &'a BufferPool,
        txn: TransactionId,
        page_id: PageId,
        frame: Arc<FrameHeader>,
        permission: Permission,
    ) -> Self {
        let frame = FrameGuard::new(page_id, frame);

        match permission {
            Permission::Write => PageGuard::WriteGuard(WriteGuard { frame, pool, txn }),
            Permission::Read => PageGuard::ReadGuard(ReadGuard { frame }),
        }
    }

    pub fn page_id(&self) -> PageId {
        match self {
            PageGuard::WriteGuard(guard) => guard.frame.page_id,
            PageGuard::ReadGuard(guard) => guard.frame.page_id,
        }
    }

    pub fn permission(&self) -> Permission {
        match self {
            PageGuard::WriteGuard(_) => Permission::Write,
            PageGuard::ReadGuard(_) => Permission::Read,
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, HeapPage> {
        match self {
            PageGuard::WriteGuard(guard) => guard.read(),
            PageGuard::ReadGuard(guard) => guard.read(),
        }
    }

    pub fn into_read_guard(self) -> Option<ReadGuard> {
        if let PageGuard::ReadGuard(guard) = self {
            Some(guard)
        } else {
            None
        }
    }

    pub fn into_write_guard(self) -> Option<WriteGuard<'a>> {
        if let PageGuard::WriteGuard(guard) = self {
            Some(guard)
        } else {
            None
        }
    }
}

// Keeps the frame pinned for as long as the guard lives
struct FrameGuard {
    page_id: PageId,
    frame: Arc<FrameHeader>,
}

impl FrameGuard {
    fn new(page_id: PageId, frame: Arc<FrameHeader>) -> Self {
        Self { page_id, frame }
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        self.frame.pin_count.fetch_sub(1, Ordering::Release);
    }
}

pub struct WriteGuard<'a> {
    frame: FrameGuard,
    pool: &'a BufferPool,
    txn: TransactionId,
}

impl<'a> WriteGuard<'a> {
    pub fn page_id(&self) -> PageId {
        self.frame.page_id
    }

    pub fn read(&self) -> RwLockReadGuard<'_, HeapPage> {
        self.frame.frame.page.read()
    }

    /// Mutable access. The page counts as dirty from here on.
    pub fn page_mut(&self) -> RwLockWriteGuard<'_, HeapPage> {
        // Latch first, a concurrent flush must not clear the flag before we write
        let page = self.frame.frame.page.write();
        self.pool
            .mark_dirty(self.txn, self.frame.page_id, &self.frame.frame, &page);
        page
    }
}

pub struct ReadGuard {
    frame: FrameGuard,
}

impl ReadGuard {
    pub fn page_id(&self) -> PageId {
        self.frame.page_id
    }

    pub fn read(&self) -> RwLockReadGuard<'_, HeapPage> {
        self.frame.frame.page.read()
    }
}
