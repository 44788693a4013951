use bytes::{BufMut, Bytes, BytesMut};

use page_constants::BITS_PER_BYTE;

use crate::{
    error::{StorageError, StorageResult},
    iterators::slot_page_iterator::SlottedPageIterator,
    storage::tuple::Tuple,
};

use super::page_id::{PageId, RecordId};

pub mod page_constants {
    // Size
    pub const DEFAULT_PAGE_SIZE: usize = 1024 * 4;
    // Anything smaller cannot hold a useful header plus a slot
    pub const MIN_PAGE_SIZE: usize = 64;

    pub const BITS_PER_BYTE: usize = 8;
}

/// Geometry of a heap page for one (page size, tuple width) pair.
///
/// ```text
/// | presence bitmap: ceil(slot_count / 8) bytes | slot 0 | slot 1 | ... | slot n-1 | pad |
/// ```
///
/// `slot_count` is the largest n such that n bits of header plus n * W bytes of
/// slots fit in the page. Bit i of the bitmap is bit (i % 8) of byte (i / 8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLayout {
    page_size: usize,
    tuple_width: usize,
    slot_count: usize,
    header_size: usize,
}

impl PageLayout {
    pub fn new(page_size: usize, tuple_width: usize) -> StorageResult<Self> {
        if tuple_width == 0 {
            return Err(StorageError::SchemaMismatch {
                reason: String::from("tuple width must be non-zero"),
            });
        }

        let slot_count = (page_size * BITS_PER_BYTE) / (tuple_width * BITS_PER_BYTE + 1);
        if slot_count == 0 {
            return Err(StorageError::SchemaMismatch {
                reason: format!(
                    "a {} byte tuple does not fit in a {} byte page",
                    tuple_width, page_size
                ),
            });
        }

        Ok(Self {
            page_size,
            tuple_width,
            slot_count,
            header_size: slot_count.div_ceil(BITS_PER_BYTE),
        })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn tuple_width(&self) -> usize {
        self.tuple_width
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    pub fn header_size(&self) -> usize {
        self.header_size
    }

    fn body_size(&self) -> usize {
        self.slot_count * self.tuple_width
    }
}

/// In-memory image of one slotted heap page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapPage {
    page_id: PageId,
    layout: PageLayout,
    header: Vec<u8>,
    slots: Vec<u8>,
}

impl HeapPage {
    pub fn new_empty(page_id: PageId, layout: PageLayout) -> Self {
        Self {
            page_id,
            layout,
            header: vec![0; layout.header_size],
            slots: vec![0; layout.body_size()],
        }
    }

    pub fn decode(page_id: PageId, layout: PageLayout, data: &[u8]) -> StorageResult<Self> {
        if data.len() != layout.page_size {
            return Err(StorageError::CorruptPage {
                page_id,
                expected: layout.page_size,
                actual: data.len(),
            });
        }

        let body_end = layout.header_size + layout.body_size();

        Ok(Self {
            page_id,
            layout,
            header: data[..layout.header_size].to_vec(),
            slots: data[layout.header_size..body_end].to_vec(),
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut buffer = BytesMut::with_capacity(self.layout.page_size);

        buffer.put_slice(&self.header);
        buffer.put_slice(&self.slots);

        // Tail bytes that fit neither a header bit nor a whole slot
        let padding = self.layout.page_size - buffer.len();
        buffer.put_bytes(0, padding);

        buffer.freeze()
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    pub fn slot_count(&self) -> usize {
        self.layout.slot_count
    }

    pub fn is_slot_used(&self, slot: usize) -> bool {
        if slot >= self.layout.slot_count {
            return false;
        }
        self.header[slot / BITS_PER_BYTE] & (1 << (slot % BITS_PER_BYTE)) != 0
    }

    pub fn num_tuples(&self) -> usize {
        (0..self.layout.slot_count)
            .filter(|slot| self.is_slot_used(*slot))
            .count()
    }

    pub fn num_empty_slots(&self) -> usize {
        self.layout.slot_count - self.num_tuples()
    }

    pub fn tuple(&self, slot: usize) -> Option<Tuple> {
        if !self.is_slot_used(slot) {
            return None;
        }

        let start = slot * self.layout.tuple_width;
        let data = Bytes::copy_from_slice(&self.slots[start..start + self.layout.tuple_width]);

        Some(Tuple::new(data).with_record_id(RecordId::new(self.page_id, slot)))
    }

    // Ascending slot order, borrows the page so it can be restarted at will
    pub fn tuples(&self) -> SlottedPageIterator<'_> {
        SlottedPageIterator::create(self)
    }

    /// First-fit insert. Returns the slot the tuple landed in.
    pub fn insert(&mut self, tuple: &Tuple) -> StorageResult<usize> {
        if tuple.len() != self.layout.tuple_width {
            return Err(StorageError::SchemaMismatch {
                reason: format!(
                    "page {} stores {} byte tuples, got {} bytes",
                    self.page_id,
                    self.layout.tuple_width,
                    tuple.len()
                ),
            });
        }

        let slot = self.first_empty_slot().ok_or(StorageError::PageFull {
            page_id: self.page_id,
        })?;

        let start = slot * self.layout.tuple_width;
        self.slots[start..start + self.layout.tuple_width].copy_from_slice(&tuple.data);
        self.set_slot(slot, true);

        Ok(slot)
    }

    // Only the bitmap is cleared, slot bytes stay behind
    pub fn delete(&mut self, slot: usize) -> StorageResult<()> {
        if !self.is_slot_used(slot) {
            return Err(StorageError::SlotEmpty {
                page_id: self.page_id,
                slot,
            });
        }

        self.set_slot(slot, false);
        Ok(())
    }

    fn first_empty_slot(&self) -> Option<usize> {
        for (byte_idx, byte) in self.header.iter().enumerate() {
            if *byte == u8::MAX {
                continue;
            }

            let slot = byte_idx * BITS_PER_BYTE + byte.trailing_ones() as usize;
            // The last header byte may have bits past slot_count
            if slot < self.layout.slot_count {
                return Some(slot);
            }
            return None;
        }

        None
    }

    fn set_slot(&mut self, slot: usize, used: bool) {
        let mask = 1 << (slot % BITS_PER_BYTE);

        if used {
            self.header[slot / BITS_PER_BYTE] |= mask;
        } else {
            self.header[slot / BITS_PER_BYTE] &= !mask;
        }
    }
}
