use std::{
    collections::HashMap,
    sync::{atomic::Ordering, Arc},
};

use dashmap::DashMap;
use hashlink::LinkedHashMap;
use parking_lot::Mutex;
use tracing::{debug, info, trace};

use crate::{
    catalog::Catalog,
    config::StorageOptions,
    error::{StorageError, StorageResult},
    storage::{
        page::{
            page::HeapPage,
            page_guard::{FrameHeader, PageGuard, ReadGuard, WriteGuard},
            page_id::{PageId, RecordId, TableId},
        },
        tuple::Tuple,
    },
    transaction::{lock_manager::LockManager, Permission, TransactionId},
    utils::replacer::{LRUKReplacer, Replacer},
};

struct PoolState {
    // PageId -> cached frame, in admission order
    frames: LinkedHashMap<PageId, Arc<FrameHeader>>,
    // The replacer to find unpinned, clean candidate frames for eviction
    replacer: LRUKReplacer<PageId>,
}

// A page some live transaction has modified
struct DirtyPage {
    // Page as it was before the transaction first touched it
    before_image: HeapPage,
    // Set once the modified page has reached disk ahead of commit
    flushed: bool,
}

/// Bounded page cache shared by every transaction.
///
/// All page access goes through [`BufferPool::get_page`], which takes the page
/// lock for the transaction before any byte of the page is observed. Eviction
/// is NO-STEAL: only frames that are unpinned and clean are candidates, so a
/// page dirtied by a running transaction stays cached until that transaction
/// completes.
pub struct BufferPool {
    num_frames: usize,
    page_size: usize,

    state: Mutex<PoolState>,

    // Pages each live transaction has dirtied
    dirtied: DashMap<TransactionId, HashMap<PageId, DirtyPage>>,

    catalog: Arc<Catalog>,
    lock_manager: Arc<dyn LockManager>,
}

impl BufferPool {
    pub fn new(
        num_frames: usize,
        page_size: usize,
        k_dist: usize,
        catalog: Arc<Catalog>,
        lock_manager: Arc<dyn LockManager>,
    ) -> Self {
        Self {
            num_frames,
            page_size,
            state: Mutex::new(PoolState {
                frames: LinkedHashMap::with_capacity(num_frames),
                replacer: LRUKReplacer::new(k_dist),
            }),
            dirtied: DashMap::new(),
            catalog,
            lock_manager,
        }
    }

    pub fn from_options(
        options: &StorageOptions,
        catalog: Arc<Catalog>,
        lock_manager: Arc<dyn LockManager>,
    ) -> StorageResult<Self> {
        options.validate()?;

        Ok(Self::new(
            options.buffer_pool_pages,
            options.page_size,
            options.replacer_k,
            catalog,
            lock_manager,
        ))
    }

    pub fn capacity(&self) -> usize {
        self.num_frames
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Returns the page with the requested permission, faulting it in from its
    /// heap file when it is not cached.
    ///
    /// Blocks until the lock manager grants the page lock. A lock wait that ends
    /// in `TransactionAborted` is returned as is.
    pub fn get_page(
        &self,
        txn: TransactionId,
        page_id: PageId,
        permission: Permission,
    ) -> StorageResult<PageGuard<'_>> {
        // Outside the state mutex so a blocked transaction never stalls the pool
        self.lock_manager.acquire(txn, page_id, permission)?;

        let frame = self.fetch_frame(page_id)?;
        Ok(PageGuard::new(self, txn, page_id, frame, permission))
    }

    pub fn read_page(&self, txn: TransactionId, page_id: PageId) -> StorageResult<ReadGuard> {
        self.get_page(txn, page_id, Permission::Read)?
            .into_read_guard()
            .ok_or_else(|| access_error(page_id, "expected a read guard"))
    }

    pub fn write_page(
        &self,
        txn: TransactionId,
        page_id: PageId,
    ) -> StorageResult<WriteGuard<'_>> {
        self.get_page(txn, page_id, Permission::Write)?
            .into_write_guard()
            .ok_or_else(|| access_error(page_id, "expected a write guard"))
    }

    fn fetch_frame(&self, page_id: PageId) -> StorageResult<Arc<FrameHeader>> {
        let cached = Self::pin_cached(&mut self.state.lock(), page_id);
        if let Some(frame) = cached {
            trace!(%page_id, "buffer pool hit");
            return Ok(frame);
        }

        debug!(%page_id, "buffer pool miss");

        let file = self.catalog.table(page_id.table_id)?;
        if file.page_size() != self.page_size {
            return Err(access_error(
                page_id,
                &format!(
                    "file uses {} byte pages, pool is configured for {}",
                    file.page_size(),
                    self.page_size
                ),
            ));
        }

        // Disk read runs outside the state mutex, a missing page never costs a cached one
        let page = file.read_page(page_id)?;

        let mut state = self.state.lock();

        // Another thread may have faulted the same page in during the read
        if let Some(frame) = Self::pin_cached(&mut state, page_id) {
            return Ok(frame);
        }

        if state.frames.len() >= self.num_frames {
            Self::evict_frame(&mut state, self.num_frames)?;
        }

        let frame = Arc::new(FrameHeader::new(page));
        frame.pin_count.fetch_add(1, Ordering::AcqRel);

        state.frames.insert(page_id, Arc::clone(&frame));
        state.replacer.record_access(page_id);

        Ok(frame)
    }

    fn pin_cached(state: &mut PoolState, page_id: PageId) -> Option<Arc<FrameHeader>> {
        let frame = state.frames.get(&page_id).cloned()?;
        frame.pin_count.fetch_add(1, Ordering::AcqRel);
        state.replacer.record_access(page_id);
        Some(frame)
    }

    fn evict_frame(state: &mut PoolState, capacity: usize) -> StorageResult<()> {
        let PoolState { frames, replacer } = state;

        let victim = replacer
            .evict(|page_id| frames.get(page_id).map_or(true, |frame| frame.is_evictable()))
            .ok_or(StorageError::BufferPoolFull { capacity })?;

        frames.remove(&victim);
        debug!(page_id = %victim, "evicted page");
        Ok(())
    }

    // Called with the page's write latch held and before the page is changed
    pub(crate) fn mark_dirty(
        &self,
        txn: TransactionId,
        page_id: PageId,
        frame: &FrameHeader,
        page: &HeapPage,
    ) {
        *frame.dirtied_by.lock() = Some(txn);
        self.dirtied
            .entry(txn)
            .or_default()
            .entry(page_id)
            .or_insert_with(|| DirtyPage {
                before_image: page.clone(),
                flushed: false,
            });
    }

    /// Writes the page back to its heap file if it is cached and dirty.
    ///
    /// The page may belong to a transaction that has not committed yet. Its
    /// before-image is kept, so aborting that transaction still restores the
    /// on-disk copy.
    pub fn flush_page(&self, page_id: PageId) -> StorageResult<()> {
        let frame = match self.state.lock().frames.get(&page_id) {
            Some(frame) => Arc::clone(frame),
            None => return Ok(()),
        };

        // Page latch before the dirty flag, the same order a writer takes them in
        let page = frame.page.read();
        let mut dirtied_by = frame.dirtied_by.lock();
        let txn = match *dirtied_by {
            Some(txn) => txn,
            None => return Ok(()),
        };

        let file = self.catalog.table(page_id.table_id)?;
        file.write_page(&page)?;

        *dirtied_by = None;
        if let Some(mut pages) = self.dirtied.get_mut(&txn) {
            if let Some(dirty) = pages.get_mut(&page_id) {
                dirty.flushed = true;
            }
        }

        debug!(%page_id, %txn, "flushed page");
        Ok(())
    }

    pub fn flush_all_pages(&self) -> StorageResult<()> {
        for page_id in self.cached_pages() {
            self.flush_page(page_id)?;
        }
        Ok(())
    }

    pub fn flush_pages(&self, txn: TransactionId) -> StorageResult<()> {
        for page_id in self.pages_dirtied_by(txn) {
            self.flush_page(page_id)?;
        }
        Ok(())
    }

    // Drops the page without writing it, the next access reloads it from disk
    pub fn discard_page(&self, page_id: PageId) {
        let mut state = self.state.lock();
        state.frames.remove(&page_id);
        state.replacer.remove(page_id);
        trace!(%page_id, "discarded page");
    }

    pub fn insert_tuple(
        &self,
        txn: TransactionId,
        table_id: TableId,
        tuple: &Tuple,
    ) -> StorageResult<Vec<PageId>> {
        let file = self.catalog.table(table_id)?;
        file.insert_tuple(txn, tuple, self)
    }

    pub fn delete_tuple(&self, txn: TransactionId, record_id: RecordId) -> StorageResult<PageId> {
        let file = self.catalog.table(record_id.page_id.table_id)?;
        file.delete_tuple(txn, record_id, self)
    }

    pub fn holds_lock(&self, txn: TransactionId, page_id: PageId) -> bool {
        self.lock_manager.holds_lock(txn, page_id)
    }

    // Early release, only safe for pages the transaction has not modified
    pub fn release_page(&self, txn: TransactionId, page_id: PageId) {
        self.lock_manager.release(txn, page_id);
    }

    /// Commit forces the transaction's dirty pages to disk, abort throws them
    /// away and puts back the before-image of any page flushed early. The
    /// transaction's locks are released once that succeeds.
    ///
    /// On error the transaction keeps its locks and its dirty set, so a
    /// failed commit can still be aborted.
    pub fn transaction_complete(&self, txn: TransactionId, commit: bool) -> StorageResult<()> {
        let pages = self.pages_dirtied_by(txn);

        if commit {
            for page_id in &pages {
                self.flush_page(*page_id)?;
            }
        } else {
            for page_id in &pages {
                self.roll_back_page(txn, *page_id)?;
            }
        }

        self.dirtied.remove(&txn);
        self.lock_manager.release_all(txn);
        info!(%txn, commit, pages = pages.len(), "transaction complete");
        Ok(())
    }

    fn roll_back_page(&self, txn: TransactionId, page_id: PageId) -> StorageResult<()> {
        self.discard_page(page_id);

        let restore = self.dirtied.get(&txn).and_then(|pages| {
            pages
                .get(&page_id)
                .filter(|dirty| dirty.flushed)
                .map(|dirty| dirty.before_image.clone())
        });
        if let Some(before_image) = restore {
            self.catalog
                .table(page_id.table_id)?
                .write_page(&before_image)?;
            debug!(%page_id, %txn, "restored before-image");
        }

        if let Some(mut pages) = self.dirtied.get_mut(&txn) {
            pages.remove(&page_id);
        }
        Ok(())
    }

    pub fn pages_dirtied_by(&self, txn: TransactionId) -> Vec<PageId> {
        self.dirtied
            .get(&txn)
            .map(|pages| pages.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn dirtied_by(&self, page_id: PageId) -> Option<TransactionId> {
        let frame = self.state.lock().frames.get(&page_id).cloned()?;
        frame.dirtied_by()
    }

    pub fn cached_pages(&self) -> Vec<PageId> {
        self.state.lock().frames.keys().copied().collect()
    }

    pub fn is_cached(&self, page_id: PageId) -> bool {
        self.state.lock().frames.contains_key(&page_id)
    }

    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        self.state
            .lock()
            .frames
            .get(&page_id)
            .map(|frame| frame.pin_count.load(Ordering::Acquire))
    }
}

fn access_error(page_id: PageId, reason: &str) -> StorageError {
    StorageError::DbAccess {
        table_id: page_id.table_id,
        reason: format!("page {}: {}", page_id, reason),
    }
}
