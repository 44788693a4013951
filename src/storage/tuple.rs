use bytes::Bytes;

use super::page::page_id::RecordId;

// Opaque fixed-width row image. The layout of the bytes belongs to the schema,
// pages only ever see `data.len()` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    pub data: Bytes,
    record_id: Option<RecordId>,
}

impl Tuple {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            record_id: None,
        }
    }

    pub fn with_record_id(mut self, record_id: RecordId) -> Self {
        self.record_id = Some(record_id);
        self
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
