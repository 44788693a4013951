use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use crate::{
    error::{StorageError, StorageResult},
    storage::{disk::heap_file::HeapFile, page::page_id::TableId},
};

use schema::Schema;

pub mod schema;

struct TableEntry {
    name: String,
    file: Arc<HeapFile>,
}

/// Resolves table ids to their heap files. Files are registered from outside,
/// a `HeapFile` never adds itself.
#[derive(Default)]
pub struct Catalog {
    tables: DashMap<TableId, TableEntry>,
    names: DashMap<String, TableId>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    // A name or id that is already present is replaced
    pub fn add_table(&self, file: Arc<HeapFile>, name: &str) -> TableId {
        let table_id = file.table_id();

        if let Some(previous) = self.names.insert(name.to_string(), table_id) {
            if previous != table_id {
                self.tables.remove(&previous);
            }
        }
        if let Some(old) = self.tables.insert(
            table_id,
            TableEntry {
                name: name.to_string(),
                file,
            },
        ) {
            if old.name != name {
                self.names.remove(&old.name);
            }
        }

        info!(%table_id, name, "registered table");
        table_id
    }

    pub fn table(&self, table_id: TableId) -> StorageResult<Arc<HeapFile>> {
        self.tables
            .get(&table_id)
            .map(|entry| Arc::clone(&entry.file))
            .ok_or(StorageError::TableNotFound { table_id })
    }

    pub fn table_id_by_name(&self, name: &str) -> Option<TableId> {
        self.names.get(name).map(|id| *id)
    }

    pub fn table_name(&self, table_id: TableId) -> Option<String> {
        self.tables.get(&table_id).map(|entry| entry.name.clone())
    }

    pub fn schema(&self, table_id: TableId) -> StorageResult<Schema> {
        self.table(table_id).map(|file| file.schema().clone())
    }

    pub fn table_ids(&self) -> Vec<TableId> {
        self.tables.iter().map(|entry| *entry.key()).collect()
    }
}
