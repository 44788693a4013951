use std::{
    fs::{self, File, OpenOptions},
    io::{self, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::{
    buffer::buffer_pool_manager::BufferPool,
    catalog::schema::Schema,
    error::{StorageError, StorageResult},
    iterators::heap_file_iterator::HeapFileIterator,
    storage::{
        page::{
            page::{HeapPage, PageLayout},
            page_id::{PageId, RecordId, TableId},
        },
        tuple::Tuple,
    },
    transaction::TransactionId,
};

/// One table stored as a flat array of pages in a single file.
///
/// Page i lives at bytes `[i * page_size, (i + 1) * page_size)`. There is no
/// free page list. The file never caches pages, every page it hands to a
/// transaction comes through the buffer pool.
pub struct HeapFile {
    path: PathBuf,
    schema: Schema,
    layout: PageLayout,
    table_id: TableId,

    // Serializes file growth so two inserters never claim the same new page
    append_lock: Mutex<()>,
}

impl HeapFile {
    /// Opens the heap file at `path`, creating an empty file if none exists.
    pub fn open(path: impl AsRef<Path>, schema: Schema, page_size: usize) -> StorageResult<Self> {
        let layout = PageLayout::new(page_size, schema.width())?;

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;

        let path = fs::canonicalize(path.as_ref())?;
        let table_id = TableId::from_canonical_path(&path);

        let len = fs::metadata(&path)?.len();
        if len % page_size as u64 != 0 {
            warn!(
                path = %path.display(),
                len,
                page_size,
                "heap file length is not a multiple of the page size, trailing bytes ignored"
            );
        }

        Ok(Self {
            path,
            schema,
            layout,
            table_id,
            append_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    pub fn page_size(&self) -> usize {
        self.layout.page_size()
    }

    pub fn num_pages(&self) -> StorageResult<u32> {
        let len = fs::metadata(&self.path)?.len();
        Ok(self.pages_in(len))
    }

    fn pages_in(&self, len: u64) -> u32 {
        (len / self.page_size() as u64) as u32
    }

    /// Reads and decodes one page straight from disk.
    pub fn read_page(&self, page_id: PageId) -> StorageResult<HeapPage> {
        self.check_owner(page_id)?;

        // Handle is scoped to this call and closed on every return path
        let mut file = File::open(&self.path)?;

        let num_pages = self.pages_in(file.metadata()?.len());
        if page_id.page_number >= num_pages {
            return Err(StorageError::PageNotFound {
                page_id,
                reason: format!("file has {} pages", num_pages),
            });
        }

        let mut buffer = vec![0u8; self.page_size()];
        file.seek(SeekFrom::Start(page_id.offset(self.page_size())))?;
        file.read_exact(&mut buffer).map_err(|err| match err.kind() {
            io::ErrorKind::UnexpectedEof => StorageError::PageNotFound {
                page_id,
                reason: String::from("short read, file is truncated"),
            },
            _ => StorageError::StorageIo(err),
        })?;

        HeapPage::decode(page_id, self.layout, &buffer)
    }

    /// Overwrites the page's slot on disk. Writing at `num_pages()` appends,
    /// anything further out would leave a gap and is refused.
    pub fn write_page(&self, page: &HeapPage) -> StorageResult<()> {
        let page_id = page.page_id();
        self.check_owner(page_id)?;

        if page.layout() != &self.layout {
            return Err(StorageError::CorruptPage {
                page_id,
                expected: self.page_size(),
                actual: page.layout().page_size(),
            });
        }

        let mut file = OpenOptions::new().write(true).open(&self.path)?;

        let num_pages = self.pages_in(file.metadata()?.len());
        if page_id.page_number > num_pages {
            return Err(StorageError::PageNotFound {
                page_id,
                reason: format!(
                    "writing past page {} would leave a gap in the file",
                    num_pages
                ),
            });
        }

        file.seek(SeekFrom::Start(page_id.offset(self.page_size())))?;
        file.write_all(&page.encode())?;
        file.flush()?;

        Ok(())
    }

    /// Inserts into the first page, counting from page 0, with a free slot.
    /// Grows the file by one page when every page is full. Returns the pages
    /// whose in-memory image changed.
    pub fn insert_tuple(
        &self,
        txn: TransactionId,
        tuple: &Tuple,
        pool: &BufferPool,
    ) -> StorageResult<Vec<PageId>> {
        if tuple.len() != self.layout.tuple_width() {
            return Err(StorageError::SchemaMismatch {
                reason: format!(
                    "table {} stores {} byte tuples, got {} bytes",
                    self.table_id,
                    self.layout.tuple_width(),
                    tuple.len()
                ),
            });
        }

        loop {
            let num_pages = self.num_pages()?;

            for page_number in 0..num_pages {
                let page_id = PageId::new(self.table_id, page_number);
                let guard = pool.write_page(txn, page_id)?;

                // Peek first so a full page is never marked dirty
                if guard.read().num_empty_slots() == 0 {
                    continue;
                }

                guard.page_mut().insert(tuple)?;
                return Ok(vec![page_id]);
            }

            let page_id = self.append_empty_page()?;
            let guard = pool.write_page(txn, page_id)?;

            // Another transaction may have filled the new page before we got its lock
            let inserted = guard.page_mut().insert(tuple);
            match inserted {
                Ok(_) => return Ok(vec![page_id]),
                Err(StorageError::PageFull { .. }) => continue,
                Err(err) => return Err(err),
            }
        }
    }

    fn append_empty_page(&self) -> StorageResult<PageId> {
        let _append = self.append_lock.lock();

        let page_id = PageId::new(self.table_id, self.num_pages()?);
        self.write_page(&HeapPage::new_empty(page_id, self.layout))?;

        debug!(%page_id, path = %self.path.display(), "heap file grew by one page");
        Ok(page_id)
    }

    pub fn delete_tuple(
        &self,
        txn: TransactionId,
        record_id: RecordId,
        pool: &BufferPool,
    ) -> StorageResult<PageId> {
        let page_id = record_id.page_id;

        if page_id.table_id != self.table_id {
            return Err(StorageError::TupleNotFound {
                record_id,
                reason: format!("record belongs to table {}", page_id.table_id),
            });
        }
        if page_id.page_number >= self.num_pages()? {
            return Err(StorageError::TupleNotFound {
                record_id,
                reason: String::from("page is past the end of the file"),
            });
        }

        let guard = pool.write_page(txn, page_id)?;

        if !guard.read().is_slot_used(record_id.slot) {
            return Err(StorageError::TupleNotFound {
                record_id,
                reason: String::from("slot is empty"),
            });
        }

        guard.page_mut().delete(record_id.slot)?;
        Ok(page_id)
    }

    pub fn iterator(self: &Arc<Self>, txn: TransactionId, pool: Arc<BufferPool>) -> HeapFileIterator {
        HeapFileIterator::new(Arc::clone(self), pool, txn)
    }

    fn check_owner(&self, page_id: PageId) -> StorageResult<()> {
        if page_id.table_id != self.table_id {
            return Err(StorageError::PageNotFound {
                page_id,
                reason: format!("page belongs to table {}, not {}", page_id.table_id, self.table_id),
            });
        }
        Ok(())
    }
}
