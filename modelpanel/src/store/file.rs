use crate::record::Record;
use crate::store::{RecordStore, StoreError, StoreResult, TableLock, TableLocks};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

/// One pretty-printed JSON array per table under `data_dir`.
pub struct FileStore {
    data_dir: PathBuf,
    locks: TableLocks,
}

impl FileStore {
    pub async fn open(data_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir).await?;
        Ok(Self { data_dir, locks: TableLocks::default() })
    }

    pub fn table_path(&self, table: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", table))
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

/// Writes to a sibling temp file first so readers never see a torn table.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes).await?;
    fs::rename(&tmp, path).await
}

#[async_trait]
impl RecordStore for FileStore {
    async fn ensure(&self, table: &str) -> StoreResult<()> {
        let path = self.table_path(table);
        let io_err = |source| StoreError::Io { table: table.to_string(), source };
        if fs::try_exists(&path).await.map_err(io_err)? {
            return Ok(());
        }
        write_atomic(&path, b"[]").await.map_err(io_err)
    }

    async fn read_all(&self, table: &str) -> StoreResult<Vec<Record>> {
        let bytes = match fs::read(self.table_path(table)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StoreError::MissingTable(table.to_string())),
            Err(source) => return Err(StoreError::Io { table: table.to_string(), source }),
        };
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt { table: table.to_string(), source })
    }

    async fn write_all(&self, table: &str, records: &[Record]) -> StoreResult<()> {
        let bytes = serde_json::to_vec_pretty(records).map_err(|source| StoreError::Corrupt { table: table.to_string(), source })?;
        write_atomic(&self.table_path(table), &bytes)
            .await
            .map_err(|source| StoreError::Io { table: table.to_string(), source })
    }

    async fn lock(&self, table: &str) -> TableLock {
        self.locks.acquire(table).await
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}
