pub mod buffer;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod iterators;
pub mod storage;
pub mod transaction;
pub mod utils;

#[cfg(test)]
mod tests;

pub use buffer::buffer_pool_manager::BufferPool;
pub use catalog::{
    schema::{DataType, Field, Schema, SchemaBuilder},
    Catalog,
};
pub use config::StorageOptions;
pub use engine::StorageEngine;
pub use error::{StorageError, StorageResult};
pub use iterators::{heap_file_iterator::HeapFileIterator, iterator::DbFileIterator};
pub use storage::{
    disk::heap_file::HeapFile,
    page::{
        page::{HeapPage, PageLayout},
        page_id::{PageId, RecordId, TableId},
    },
    tuple::Tuple,
};
pub use transaction::{
    lock_manager::{LockManager, PageLockTable},
    Permission, TransactionId,
};
