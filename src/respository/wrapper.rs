use crate::config::Settings;
use crate::respository::r#trait::LedgerStore;
use crate::respository::MemoryStore;
use crate::types::AppError;
use async_trait::async_trait;
use log::{info, warn};
use std::sync::Arc;

#[cfg(feature = "rocksdb-backend")]
use crate::respository::RocksDbStore;

/// Store wrapper - picks the backend from settings
#[derive(Clone)]
pub enum StoreWrapper {
  Memory(Arc<MemoryStore>),
  #[cfg(feature = "rocksdb-backend")]
  RocksDb(Arc<RocksDbStore>),
}

impl StoreWrapper {
  pub fn from_settings(settings: &Settings) -> Result<Self, AppError> {
    if settings.repository.memory_db {
      warn!("[Store] memory_db = true, ledger state will not survive a restart");
      return Ok(StoreWrapper::Memory(Arc::new(MemoryStore::new())));
    }

    #[cfg(feature = "rocksdb-backend")]
    {
      let path = settings.rocksdb_path();
      info!("[Store] Using RocksDB at {}", path);
      Ok(StoreWrapper::RocksDb(Arc::new(RocksDbStore::open(&path)?)))
    }

    #[cfg(not(feature = "rocksdb-backend"))]
    {
      info!("[Store] rocksdb-backend feature not enabled");
      Err(AppError::Initialization(
        "memory_db = false requires the rocksdb-backend feature".to_string(),
      ))
    }
  }
}

#[async_trait]
impl LedgerStore for StoreWrapper {
  async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, AppError> {
    match self {
      StoreWrapper::Memory(s) => s.get(key).await,
      #[cfg(feature = "rocksdb-backend")]
      StoreWrapper::RocksDb(s) => s.get(key).await,
    }
  }

  async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), AppError> {
    match self {
      StoreWrapper::Memory(s) => s.put(key, value).await,
      #[cfg(feature = "rocksdb-backend")]
      StoreWrapper::RocksDb(s) => s.put(key, value).await,
    }
  }

  async fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, AppError> {
    match self {
      StoreWrapper::Memory(s) => s.prefix_scan(prefix).await,
      #[cfg(feature = "rocksdb-backend")]
      StoreWrapper::RocksDb(s) => s.prefix_scan(prefix).await,
    }
  }
}
