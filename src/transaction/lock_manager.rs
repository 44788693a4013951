use std::{
    collections::{HashMap, HashSet},
    time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};

use crate::{
    error::{StorageError, StorageResult},
    storage::page::page_id::PageId,
};

use super::{Permission, TransactionId};

/// Page-granularity concurrency control consumed by the buffer pool.
///
/// `acquire` blocks the calling thread until the lock is granted. A waiter that
/// is chosen as a deadlock victim must surface `TransactionAborted` instead of
/// blocking forever.
pub trait LockManager: Send + Sync {
    fn acquire(&self, txn: TransactionId, page_id: PageId, permission: Permission)
        -> StorageResult<()>;
    fn release(&self, txn: TransactionId, page_id: PageId);
    fn release_all(&self, txn: TransactionId);
    fn holds_lock(&self, txn: TransactionId, page_id: PageId) -> bool;
}

#[derive(Debug, Default)]
struct LockState {
    readers: HashSet<TransactionId>,
    writer: Option<TransactionId>,
}

impl LockState {
    fn is_free(&self) -> bool {
        self.readers.is_empty() && self.writer.is_none()
    }

    fn can_grant(&self, txn: TransactionId, permission: Permission) -> bool {
        let no_other_writer = self.writer.map_or(true, |writer| writer == txn);

        match permission {
            Permission::Read => no_other_writer,
            // Upgrade only when the requester is the sole reader
            Permission::Write => {
                no_other_writer && self.readers.iter().all(|reader| *reader == txn)
            }
        }
    }

    fn grant(&mut self, txn: TransactionId, permission: Permission) {
        match permission {
            Permission::Read => {
                if self.writer != Some(txn) {
                    self.readers.insert(txn);
                }
            }
            Permission::Write => {
                self.readers.remove(&txn);
                self.writer = Some(txn);
            }
        }
    }
}

#[derive(Debug, Default)]
struct LockTableInner {
    locks: HashMap<PageId, LockState>,
    held: HashMap<TransactionId, HashSet<PageId>>,
}

impl LockTableInner {
    fn try_grant(&mut self, txn: TransactionId, page_id: PageId, permission: Permission) -> bool {
        let state = self.locks.entry(page_id).or_default();
        if !state.can_grant(txn, permission) {
            return false;
        }

        state.grant(txn, permission);
        self.held.entry(txn).or_default().insert(page_id);
        true
    }

    fn release(&mut self, txn: TransactionId, page_id: PageId) {
        if let Some(state) = self.locks.get_mut(&page_id) {
            state.readers.remove(&txn);
            if state.writer == Some(txn) {
                state.writer = None;
            }
            if state.is_free() {
                self.locks.remove(&page_id);
            }
        }

        if let Some(pages) = self.held.get_mut(&txn) {
            pages.remove(&page_id);
            if pages.is_empty() {
                self.held.remove(&txn);
            }
        }
    }
}

/// Shared/exclusive page locks with timeout-based deadlock resolution.
pub struct PageLockTable {
    inner: Mutex<LockTableInner>,
    released: Condvar,
    timeout: Duration,
}

impl PageLockTable {
    pub fn new(timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(LockTableInner::default()),
            released: Condvar::new(),
            timeout,
        }
    }

    pub fn pages_locked_by(&self, txn: TransactionId) -> Vec<PageId> {
        let inner = self.inner.lock();
        inner
            .held
            .get(&txn)
            .map(|pages| pages.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl LockManager for PageLockTable {
    fn acquire(
        &self,
        txn: TransactionId,
        page_id: PageId,
        permission: Permission,
    ) -> StorageResult<()> {
        let deadline = Instant::now() + self.timeout;
        let mut inner = self.inner.lock();

        loop {
            if inner.try_grant(txn, page_id, permission) {
                trace!(%txn, %page_id, ?permission, "page lock granted");
                return Ok(());
            }

            debug!(%txn, %page_id, ?permission, "waiting for page lock");

            if self.released.wait_until(&mut inner, deadline).timed_out() {
                // One last look, a release may have raced the timeout
                if inner.try_grant(txn, page_id, permission) {
                    return Ok(());
                }

                warn!(%txn, %page_id, ?permission, "page lock wait timed out");
                return Err(StorageError::TransactionAborted {
                    txn,
                    reason: format!(
                        "timed out after {:?} waiting for {:?} lock on {}",
                        self.timeout, permission, page_id
                    ),
                });
            }
        }
    }

    fn release(&self, txn: TransactionId, page_id: PageId) {
        self.inner.lock().release(txn, page_id);
        self.released.notify_all();
    }

    fn release_all(&self, txn: TransactionId) {
        {
            let mut inner = self.inner.lock();
            let pages: Vec<PageId> = inner
                .held
                .get(&txn)
                .map(|pages| pages.iter().copied().collect())
                .unwrap_or_default();

            for page_id in pages {
                inner.release(txn, page_id);
            }
        }
        self.released.notify_all();
    }

    fn holds_lock(&self, txn: TransactionId, page_id: PageId) -> bool {
        let inner = self.inner.lock();
        inner.locks.get(&page_id).map_or(false, |state| {
            state.writer == Some(txn) || state.readers.contains(&txn)
        })
    }
}
