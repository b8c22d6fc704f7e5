use crate::coin::bitcoin::model::{SpendType, UtxoInfo};
use crate::ledger::keys::KeyLayout;
use crate::respository::LedgerStore;
use crate::types::AppError;

use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory index of federation UTXOs, written through to the store.
///
/// The orchestrator is the only writer; lookups may come from anywhere.
pub struct UtxoLedger {
  store: Arc<dyn LedgerStore>,
  keys: KeyLayout,
  index: RwLock<HashMap<String, UtxoInfo>>,
}

impl UtxoLedger {
  pub fn new(store: Arc<dyn LedgerStore>, keys: KeyLayout) -> Self {
    Self {
      store,
      keys,
      index: RwLock::new(HashMap::new()),
    }
  }

  pub async fn lookup(&self, utxo_id: &str) -> Option<UtxoInfo> {
    self.index.read().await.get(utxo_id).cloned()
  }

  pub async fn contains(&self, utxo_id: &str) -> bool {
    self.index.read().await.contains_key(utxo_id)
  }

  /// Inserts or overwrites, then persists. A failed write is logged and the
  /// in-memory entry is kept. Returns whether the write reached the store.
  pub async fn upsert(&self, utxo: UtxoInfo) -> bool {
    let utxo_id = utxo.utxo_id();
    self.index.write().await.insert(utxo_id.clone(), utxo.clone());
    self.persist(&utxo_id, &utxo).await
  }

  /// Drops the entry from memory only; the stored record keeps its last state.
  pub async fn evict(&self, utxo_id: &str) -> Option<UtxoInfo> {
    self.index.write().await.remove(utxo_id)
  }

  pub async fn len(&self) -> usize {
    self.index.read().await.len()
  }

  pub async fn is_empty(&self) -> bool {
    self.index.read().await.is_empty()
  }

  /// Outputs that can still be claimed by the federation.
  pub async fn claimable_utxos(&self) -> Vec<UtxoInfo> {
    let index = self.index.read().await;
    let mut utxos: Vec<UtxoInfo> = index
      .values()
      .filter(|u| u.spend_type == SpendType::Confirmed)
      .cloned()
      .collect();
    utxos.sort_by(|a, b| (a.block_height, &a.txid, a.vout).cmp(&(b.block_height, &b.txid, b.vout)));
    utxos
  }

  /// Repopulates the index from the store. Spent and removed entries stay on
  /// disk only.
  pub async fn load_from_store(&self) -> Result<usize, AppError> {
    let records = self.persisted_utxos().await?;
    let mut index = self.index.write().await;
    let mut loaded = 0;
    for (utxo_id, utxo) in records {
      if utxo.spend_type.is_terminal() || utxo.spend_type == SpendType::Removed {
        continue;
      }
      debug!("[UtxoLedger] load utxo {} state {:?}", utxo_id, utxo.spend_type);
      index.insert(utxo_id, utxo);
      loaded += 1;
    }
    info!("[UtxoLedger] Loaded {} utxos from store", loaded);
    Ok(loaded)
  }

  /// Stored record of one UTXO, whether or not it is still indexed.
  pub async fn persisted(&self, utxo_id: &str) -> Result<Option<UtxoInfo>, AppError> {
    let key = self.keys.utxo_key(utxo_id);
    match self.store.get(key.as_bytes()).await? {
      Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
      None => Ok(None),
    }
  }

  /// Every decodable UTXO record in the store, terminal ones included.
  pub async fn persisted_utxos(&self) -> Result<Vec<(String, UtxoInfo)>, AppError> {
    let prefix = self.keys.utxo_scan_prefix();
    let rows = self.store.prefix_scan(prefix.as_bytes()).await?;
    let mut utxos = Vec::with_capacity(rows.len());
    for (key, value) in rows {
      let key = String::from_utf8_lossy(&key).into_owned();
      let Some(utxo_id) = self.keys.utxo_id_from_key(&key) else {
        continue;
      };
      match serde_json::from_slice::<UtxoInfo>(&value) {
        Ok(utxo) => utxos.push((utxo_id.to_string(), utxo)),
        Err(e) => warn!("[UtxoLedger] Skipping undecodable utxo record {}: {}", key, e),
      }
    }
    Ok(utxos)
  }

  async fn persist(&self, utxo_id: &str, utxo: &UtxoInfo) -> bool {
    let data = match serde_json::to_vec(utxo) {
      Ok(data) => data,
      Err(e) => {
        warn!("[UtxoLedger] Marshal utxo {} failed: {}", utxo_id, e);
        return false;
      }
    };
    let key = self.keys.utxo_key(utxo_id);
    match self.store.put(key.as_bytes(), &data).await {
      Ok(()) => {
        debug!("[UtxoLedger] stored utxo {} state {:?}", utxo_id, utxo.spend_type);
        true
      }
      Err(e) => {
        warn!("[UtxoLedger] Store utxo {} failed: {}", utxo_id, e);
        false
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::respository::MemoryStore;

  fn utxo(txid: &str, vout: u32, state: SpendType) -> UtxoInfo {
    let mut utxo = UtxoInfo::new("3fed".into(), txid.into(), vout, 1_000, state);
    utxo.block_height = 10;
    utxo
  }

  #[tokio::test]
  async fn reload_skips_spent_and_removed_entries() {
    let store = Arc::new(MemoryStore::new());
    let ledger = UtxoLedger::new(store.clone(), KeyLayout::new("btc"));
    ledger.upsert(utxo("aa", 0, SpendType::Confirmed)).await;
    ledger.upsert(utxo("bb", 1, SpendType::Spending)).await;
    ledger.upsert(utxo("cc", 0, SpendType::Spent)).await;
    ledger.upsert(utxo("ee", 2, SpendType::Removed)).await;
    store.put(b"btc_utxo_dd_0", b"not json").await.unwrap();

    let reloaded = UtxoLedger::new(store, KeyLayout::new("btc"));
    assert_eq!(reloaded.load_from_store().await.unwrap(), 2);
    assert!(reloaded.contains("aa_0").await);
    assert!(reloaded.contains("bb_1").await);
    assert!(!reloaded.contains("cc_0").await);
    assert!(!reloaded.contains("dd_0").await);
    assert!(!reloaded.contains("ee_2").await);
  }

  #[tokio::test]
  async fn evict_keeps_durable_record() {
    let store = Arc::new(MemoryStore::new());
    let ledger = UtxoLedger::new(store.clone(), KeyLayout::new("btc"));
    let mut entry = utxo("aa", 0, SpendType::Confirmed);
    ledger.upsert(entry.clone()).await;
    entry.spend_type = SpendType::Spent;
    ledger.upsert(entry).await;
    assert!(ledger.evict("aa_0").await.is_some());
    assert!(ledger.lookup("aa_0").await.is_none());

    let raw = store.get(b"btc_utxo_aa_0").await.unwrap().unwrap();
    let stored: UtxoInfo = serde_json::from_slice(&raw).unwrap();
    assert_eq!(stored.spend_type, SpendType::Spent);
  }

  #[tokio::test]
  async fn claimable_lists_confirmed_only() {
    let ledger = UtxoLedger::new(Arc::new(MemoryStore::new()), KeyLayout::new("btc"));
    ledger.upsert(utxo("aa", 0, SpendType::Confirmed)).await;
    ledger.upsert(utxo("bb", 0, SpendType::Pending)).await;
    ledger.upsert(utxo("cc", 0, SpendType::Spending)).await;
    let claimable = ledger.claimable_utxos().await;
    assert_eq!(claimable.len(), 1);
    assert_eq!(claimable[0].txid, "aa");
  }
}
