use crate::respository::r#trait::LedgerStore;
use crate::types::AppError;
use async_trait::async_trait;
use log::info;
use rocksdb::{Direction, IteratorMode, Options, DB};
use std::path::Path;
use std::sync::Arc;

/// Open RocksDB database
pub fn open_rocksdb(path_str: &str) -> Result<DB, AppError> {
  let path = Path::new(path_str);
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent)?;
  }
  let mut opts = Options::default();
  opts.create_if_missing(true);

  DB::open(&opts, path).map_err(|e| {
    AppError::Initialization(format!("Failed to open RocksDB at '{}': {}", path_str, e))
  })
}

/// RocksDB backed ledger store
#[derive(Clone)]
pub struct RocksDbStore {
  db: Arc<DB>,
}

impl RocksDbStore {
  pub fn open(path_str: &str) -> Result<Self, AppError> {
    let db = open_rocksdb(path_str)?;
    info!("[RocksDbStore] Opened RocksDB at {}", path_str);
    Ok(Self { db: Arc::new(db) })
  }
}

#[async_trait]
impl LedgerStore for RocksDbStore {
  async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, AppError> {
    self.db
      .get(key)
      .map_err(|e| AppError::Database(format!("RocksDB get failed: {}", e)))
  }

  async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), AppError> {
    self.db
      .put(key, value)
      .map_err(|e| AppError::Database(format!("RocksDB put failed: {}", e)))
  }

  async fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, AppError> {
    let mut rows = Vec::new();
    for item in self.db.iterator(IteratorMode::From(prefix, Direction::Forward)) {
      let (key, value) =
        item.map_err(|e| AppError::Database(format!("RocksDB iteration failed: {}", e)))?;
      if !key.starts_with(prefix) {
        break;
      }
      rows.push((key.to_vec(), value.to_vec()));
    }
    Ok(rows)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("btc_db");
    let path = path.to_str().unwrap();

    {
      let store = RocksDbStore::open(path).unwrap();
      store.put(b"btc_utxo_aa_0", b"{}").await.unwrap();
      store.put(b"btc_utxo_bb_1", b"{}").await.unwrap();
      store.put(b"confirmHeight", b"120").await.unwrap();
    }

    let store = RocksDbStore::open(path).unwrap();
    assert_eq!(store.get(b"confirmHeight").await.unwrap(), Some(b"120".to_vec()));
    let rows = store.prefix_scan(b"btc_utxo_").await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].0, b"btc_utxo_aa_0".to_vec());
  }
}
