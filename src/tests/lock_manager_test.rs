#[cfg(test)]
pub mod test {
    use std::{
        sync::{mpsc, Arc},
        thread,
        time::Duration,
    };

    use crate::{
        error::StorageError,
        storage::page::page_id::{PageId, TableId},
        tests::fixtures::LOCK_TIMEOUT,
        transaction::{
            lock_manager::{LockManager, PageLockTable},
            Permission, TransactionId,
        },
    };

    fn page(n: u32) -> PageId {
        PageId::new(TableId(11), n)
    }

    #[test]
    fn shared_locks_are_compatible() {
        let table = PageLockTable::new(LOCK_TIMEOUT);
        let (a, b) = (TransactionId::new(), TransactionId::new());

        table.acquire(a, page(0), Permission::Read).unwrap();
        table.acquire(b, page(0), Permission::Read).unwrap();

        assert!(table.holds_lock(a, page(0)));
        assert!(table.holds_lock(b, page(0)));
        assert!(!table.holds_lock(a, page(1)));
    }

    #[test]
    fn exclusive_conflict_times_out() {
        let table = PageLockTable::new(LOCK_TIMEOUT);
        let (a, b) = (TransactionId::new(), TransactionId::new());

        table.acquire(a, page(0), Permission::Write).unwrap();

        match table.acquire(b, page(0), Permission::Read) {
            Err(StorageError::TransactionAborted { txn, .. }) => assert_eq!(txn, b),
            other => panic!("expected TransactionAborted, got {:?}", other),
        }
        assert!(!table.holds_lock(b, page(0)));

        // Readers also block writers
        table.acquire(b, page(1), Permission::Read).unwrap();
        assert!(matches!(
            table.acquire(a, page(1), Permission::Write),
            Err(StorageError::TransactionAborted { .. })
        ));
    }

    #[test]
    fn sole_reader_upgrades() {
        let table = PageLockTable::new(LOCK_TIMEOUT);
        let (a, b) = (TransactionId::new(), TransactionId::new());

        table.acquire(a, page(0), Permission::Read).unwrap();
        table.acquire(a, page(0), Permission::Write).unwrap();

        // Re-entrant in both directions
        table.acquire(a, page(0), Permission::Read).unwrap();
        table.acquire(a, page(0), Permission::Write).unwrap();

        assert!(matches!(
            table.acquire(b, page(0), Permission::Read),
            Err(StorageError::TransactionAborted { .. })
        ));

        // Two readers, neither may upgrade
        table.acquire(a, page(1), Permission::Read).unwrap();
        table.acquire(b, page(1), Permission::Read).unwrap();
        assert!(matches!(
            table.acquire(a, page(1), Permission::Write),
            Err(StorageError::TransactionAborted { .. })
        ));
    }

    #[test]
    fn release_wakes_waiter() {
        let table = Arc::new(PageLockTable::new(Duration::from_secs(5)));
        let (a, b) = (TransactionId::new(), TransactionId::new());

        table.acquire(a, page(0), Permission::Write).unwrap();

        let (tx, rx) = mpsc::channel();
        let waiter = {
            let table = Arc::clone(&table);
            thread::spawn(move || {
                let result = table.acquire(b, page(0), Permission::Write);
                tx.send(result.is_ok()).unwrap();
            })
        };

        // Still blocked while a holds the lock
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());

        table.release(a, page(0));
        assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap());
        waiter.join().unwrap();

        assert!(table.holds_lock(b, page(0)));
        assert!(!table.holds_lock(a, page(0)));
    }

    #[test]
    fn release_all_drops_every_lock() {
        let table = PageLockTable::new(LOCK_TIMEOUT);
        let (a, b) = (TransactionId::new(), TransactionId::new());

        table.acquire(a, page(0), Permission::Read).unwrap();
        table.acquire(a, page(1), Permission::Write).unwrap();
        table.acquire(a, page(2), Permission::Write).unwrap();

        let mut locked = table.pages_locked_by(a);
        locked.sort();
        assert_eq!(locked, vec![page(0), page(1), page(2)]);

        table.release_all(a);

        assert!(table.pages_locked_by(a).is_empty());
        for n in 0..3 {
            assert!(!table.holds_lock(a, page(n)));
            table.acquire(b, page(n), Permission::Write).unwrap();
        }
    }
}
