#[cfg(test)]
mod tests {
    use crate::{
        error::StorageError,
        storage::{
            page::{
                page::{HeapPage, PageLayout},
                page_id::{PageId, TableId},
            },
            tuple::Tuple,
        },
        tests::fixtures::{row, row_id, SLOTS_PER_SMALL_PAGE, SMALL_PAGE},
    };

    fn new_page() -> HeapPage {
        HeapPage::new_empty(
            PageId::new(TableId(1), 3),
            PageLayout::new(SMALL_PAGE, 8).unwrap(),
        )
    }

    #[test]
    fn insert_is_first_fit() {
        let mut page = new_page();

        assert_eq!(page.insert(&row(0)).unwrap(), 0);
        assert_eq!(page.insert(&row(1)).unwrap(), 1);
        assert_eq!(page.insert(&row(2)).unwrap(), 2);

        page.delete(1).unwrap();
        page.delete(0).unwrap();

        // Lowest free bit wins
        assert_eq!(page.insert(&row(3)).unwrap(), 0);
        assert_eq!(page.insert(&row(4)).unwrap(), 1);
        assert_eq!(page.insert(&row(5)).unwrap(), 3);

        let ids: Vec<i32> = page.tuples().map(|(_, tuple)| row_id(&tuple)).collect();
        assert_eq!(ids, vec![3, 4, 2, 5]);
    }

    #[test]
    fn full_page_rejects_insert_unchanged() {
        let mut page = new_page();
        for id in 0..SLOTS_PER_SMALL_PAGE as i32 {
            page.insert(&row(id)).unwrap();
        }
        assert_eq!(page.num_empty_slots(), 0);

        let before = page.clone();
        match page.insert(&row(99)) {
            Err(StorageError::PageFull { page_id }) => assert_eq!(page_id, page.page_id()),
            other => panic!("expected PageFull, got {:?}", other),
        }
        assert_eq!(page, before);
    }

    #[test]
    fn delete_of_empty_slot_is_rejected_unchanged() {
        let mut page = new_page();
        page.insert(&row(0)).unwrap();
        page.delete(0).unwrap();

        let before = page.clone();
        assert!(matches!(
            page.delete(0),
            Err(StorageError::SlotEmpty { slot: 0, .. })
        ));
        assert!(matches!(
            page.delete(SLOTS_PER_SMALL_PAGE + 5),
            Err(StorageError::SlotEmpty { .. })
        ));
        assert_eq!(page, before);
    }

    #[test]
    fn delete_only_clears_the_bit() {
        let mut page = new_page();
        page.insert(&row(42)).unwrap();
        page.delete(0).unwrap();

        assert!(!page.is_slot_used(0));
        assert!(page.tuple(0).is_none());

        // Slot bytes stay, the bitmap alone says the slot is free
        let bytes = page.encode();
        assert_eq!(bytes[0], 0);
        assert_eq!(&bytes[1..9], &row(42).data[..]);
    }

    #[test]
    fn wrong_width_is_rejected() {
        let mut page = new_page();
        let before = page.clone();

        assert!(matches!(
            page.insert(&Tuple::new(vec![1u8; 5])),
            Err(StorageError::SchemaMismatch { .. })
        ));
        assert_eq!(page, before);
    }
}
