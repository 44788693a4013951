use std::io;

use thiserror::Error;

use crate::{
    storage::page::page_id::{PageId, RecordId, TableId},
    transaction::TransactionId,
};

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    // Malformed byte length handed to the page decoder
    #[error("page {page_id} is corrupted: expected {expected} bytes, got {actual}")]
    CorruptPage {
        page_id: PageId,
        expected: usize,
        actual: usize,
    },

    #[error("page {page_id} has no empty slots")]
    PageFull { page_id: PageId },

    #[error("slot {slot} of page {page_id} is already empty")]
    SlotEmpty { page_id: PageId, slot: usize },

    #[error("page {page_id} does not exist: {reason}")]
    PageNotFound { page_id: PageId, reason: String },

    #[error("buffer pool is full: all {capacity} frames are pinned or dirty")]
    BufferPoolFull { capacity: usize },

    #[error("no tuple at {record_id}: {reason}")]
    TupleNotFound { record_id: RecordId, reason: String },

    #[error("iterator has no more tuples")]
    NoSuchElement,

    #[error("cannot access table {table_id}: {reason}")]
    DbAccess { table_id: TableId, reason: String },

    #[error("table {table_id} is not registered in the catalog")]
    TableNotFound { table_id: TableId },

    #[error("transaction {txn} aborted: {reason}")]
    TransactionAborted { txn: TransactionId, reason: String },

    #[error("tuple does not match schema: {reason}")]
    SchemaMismatch { reason: String },

    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("storage I/O error: {0}")]
    StorageIo(#[from] io::Error),
}
