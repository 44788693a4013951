use std::{path::Path, sync::Arc};

use anyhow::Context;
use tracing::info;

use crate::{
    buffer::buffer_pool_manager::BufferPool,
    catalog::{
        schema::{Field, Schema},
        Catalog,
    },
    config::StorageOptions,
    error::StorageResult,
    iterators::heap_file_iterator::HeapFileIterator,
    storage::{
        disk::heap_file::HeapFile,
        page::page_id::{PageId, RecordId, TableId},
    },
    transaction::{lock_manager::PageLockTable, TransactionId},
};

/// Wires a catalog, a page lock table and one buffer pool together.
pub struct StorageEngine {
    pub(crate) options: StorageOptions,
    pub(crate) catalog: Arc<Catalog>,
    pub(crate) lock_table: Arc<PageLockTable>,
    pub(crate) bpm: Arc<BufferPool>,
}

impl StorageEngine {
    pub fn open(options: StorageOptions) -> anyhow::Result<StorageEngine> {
        options.validate().context("invalid storage options")?;

        let catalog = Arc::new(Catalog::new());
        let lock_table = Arc::new(PageLockTable::new(options.lock_timeout));
        let bpm = Arc::new(
            BufferPool::from_options(&options, catalog.clone(), lock_table.clone())
                .context("building buffer pool")?,
        );

        info!(
            page_size = options.page_size,
            pool_pages = options.buffer_pool_pages,
            "storage engine opened"
        );

        Ok(StorageEngine {
            options,
            catalog,
            lock_table,
            bpm,
        })
    }

    pub fn options(&self) -> &StorageOptions {
        &self.options
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPool> {
        &self.bpm
    }

    pub fn lock_table(&self) -> &Arc<PageLockTable> {
        &self.lock_table
    }

    /// Opens (or creates) the heap file at `path` and registers it under `name`.
    pub fn create_table(
        &self,
        name: &str,
        path: impl AsRef<Path>,
        schema: Schema,
    ) -> anyhow::Result<TableId> {
        let path = path.as_ref();
        let file = HeapFile::open(path, schema, self.options.page_size)
            .with_context(|| format!("opening heap file {}", path.display()))?;

        Ok(self.catalog.add_table(Arc::new(file), name))
    }

    pub fn begin(&self) -> TransactionId {
        TransactionId::new()
    }

    pub fn commit(&self, txn: TransactionId) -> anyhow::Result<()> {
        self.bpm
            .transaction_complete(txn, true)
            .with_context(|| format!("committing {}", txn))
    }

    pub fn abort(&self, txn: TransactionId) -> anyhow::Result<()> {
        self.bpm
            .transaction_complete(txn, false)
            .with_context(|| format!("aborting {}", txn))
    }

    pub fn insert(
        &self,
        txn: TransactionId,
        table_id: TableId,
        values: &[Field],
    ) -> StorageResult<Vec<PageId>> {
        let tuple = self.catalog.schema(table_id)?.encode(values)?;
        self.bpm.insert_tuple(txn, table_id, &tuple)
    }

    pub fn delete(&self, txn: TransactionId, record_id: RecordId) -> StorageResult<PageId> {
        self.bpm.delete_tuple(txn, record_id)
    }

    pub fn scan(&self, txn: TransactionId, table_id: TableId) -> StorageResult<HeapFileIterator> {
        let file = self.catalog.table(table_id)?;
        Ok(file.iterator(txn, self.bpm.clone()))
    }

    // Writes every dirty page, used on clean shutdown
    pub fn shutdown(&self) -> anyhow::Result<()> {
        self.bpm
            .flush_all_pages()
            .context("flushing buffer pool on shutdown")
    }
}
