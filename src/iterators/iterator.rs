use crate::{error::StorageResult, storage::tuple::Tuple};

/// Restartable scan over the tuples of one file.
///
/// `has_next` may fault pages in and must be idempotent. `close` never releases
/// locks, those belong to the owning transaction.
pub trait DbFileIterator {
    fn open(&mut self) -> StorageResult<()>;

    fn has_next(&mut self) -> StorageResult<bool>;

    fn next(&mut self) -> StorageResult<Tuple>;

    fn rewind(&mut self) -> StorageResult<()> {
        self.close();
        self.open()
    }

    fn close(&mut self);
}
