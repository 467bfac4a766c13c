use crate::record::Record;
use crate::store::{RecordStore, StoreError, StoreResult, TableLock, TableLocks};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// Volatile backend; same contract as the file store.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<Record>>>,
    locks: TableLocks,
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn ensure(&self, table: &str) -> StoreResult<()> {
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        tables.entry(table.to_string()).or_default();
        Ok(())
    }

    async fn read_all(&self, table: &str) -> StoreResult<Vec<Record>> {
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        tables.get(table).cloned().ok_or_else(|| StoreError::MissingTable(table.to_string()))
    }

    async fn write_all(&self, table: &str, records: &[Record]) -> StoreResult<()> {
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        tables.insert(table.to_string(), records.to_vec());
        Ok(())
    }

    async fn lock(&self, table: &str) -> TableLock {
        self.locks.acquire(table).await
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
