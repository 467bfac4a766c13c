use crate::record::Record;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("table '{0}' does not exist")]
    MissingTable(String),
    #[error("io failure on table '{table}': {source}")]
    Io {
        table: String,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt data in table '{table}': {source}")]
    Corrupt {
        table: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Held for the duration of a read-modify-write on one table.
pub type TableLock = OwnedMutexGuard<()>;

/// Ordered, whole-table persistence of records; one table per model.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn ensure(&self, table: &str) -> StoreResult<()>;
    async fn read_all(&self, table: &str) -> StoreResult<Vec<Record>>;
    async fn write_all(&self, table: &str, records: &[Record]) -> StoreResult<()>;
    async fn lock(&self, table: &str) -> TableLock;
    fn backend_name(&self) -> &'static str;
}

/// Lazily created async mutex per table name.
#[derive(Default)]
pub struct TableLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl TableLocks {
    pub async fn acquire(&self, table: &str) -> TableLock {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(map.entry(table.to_string()).or_default())
        };
        lock.lock_owned().await
    }
}
