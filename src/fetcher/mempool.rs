use crate::coin::coin_trait::ChainQuerySource;
use crate::fetcher::fetcher::Poller;
use crate::types::{AppError, TxSender};

use async_trait::async_trait;
use bitcoin::Txid;
use log::warn;
use std::collections::HashSet;
use std::sync::Arc;

/// Diffs the node mempool against the previous cycle and emits new
/// transactions. Ids that leave the mempool are simply forgotten.
pub struct MempoolPoller<C: ChainQuerySource> {
  client: Arc<C>,
  sender: TxSender,
  seen: HashSet<Txid>,
}

impl<C: ChainQuerySource> MempoolPoller<C> {
  pub fn new(client: Arc<C>, sender: TxSender) -> Self {
    Self {
      client,
      sender,
      seen: HashSet::new(),
    }
  }

  pub fn seen(&self) -> &HashSet<Txid> {
    &self.seen
  }
}

#[async_trait]
impl<C: ChainQuerySource + 'static> Poller for MempoolPoller<C> {
  async fn poll_once(&mut self) -> Result<usize, AppError> {
    let txids = self.client.mempool_txids().await?;
    let mut next_seen = HashSet::with_capacity(txids.len());
    let mut emitted = 0;

    for txid in txids {
      if self.seen.contains(&txid) {
        next_seen.insert(txid);
        continue;
      }
      match self.client.transaction_by_id(&txid).await {
        Ok(tx) => {
          self.sender.send(tx).await?;
          next_seen.insert(txid);
          emitted += 1;
        }
        Err(e) if e.is_transient() => {
          // not marked seen, fetched again next cycle if still there
          warn!("[{} Mempool] fetch {} failed: {}", self.client.chain_name(), txid, e);
        }
        Err(e) => {
          warn!("[{} Mempool] skipping malformed tx {}: {}", self.client.chain_name(), txid, e);
          next_seen.insert(txid);
        }
      }
    }

    self.seen = next_seen;
    Ok(emitted)
  }

  fn name(&self) -> &'static str {
    "Mempool"
  }
}
