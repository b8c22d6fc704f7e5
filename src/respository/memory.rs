use crate::respository::r#trait::LedgerStore;
use crate::types::AppError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory store, used for `memory_db = true` and in tests.
#[derive(Clone, Default)]
pub struct MemoryStore {
  entries: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub async fn len(&self) -> usize {
    self.entries.read().await.len()
  }

  pub async fn is_empty(&self) -> bool {
    self.entries.read().await.is_empty()
  }
}

#[async_trait]
impl LedgerStore for MemoryStore {
  async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, AppError> {
    let entries = self.entries.read().await;
    Ok(entries.get(key).cloned())
  }

  async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), AppError> {
    let mut entries = self.entries.write().await;
    entries.insert(key.to_vec(), value.to_vec());
    Ok(())
  }

  async fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, AppError> {
    let entries = self.entries.read().await;
    Ok(entries
      .range(prefix.to_vec()..)
      .take_while(|(k, _)| k.starts_with(prefix))
      .map(|(k, v)| (k.clone(), v.clone()))
      .collect())
  }
}
