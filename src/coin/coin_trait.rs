/**
* filename : coin_trait
* description: Query capability over a trusted chain node.
**/

use crate::coin::bitcoin::model::BlockData;
use crate::types::AppError;
use async_trait::async_trait;
use bitcoin::{BlockHash, Transaction, Txid};
use std::collections::HashSet;

#[async_trait]
pub trait ChainQuerySource: Send + Sync {
  async fn current_height(&self) -> Result<u64, AppError>;

  async fn block_at_height(&self, height: u64) -> Result<BlockData, AppError>;

  /// Hash of the block currently at `height`; used to notice reorgs without
  /// downloading the block.
  async fn block_hash(&self, height: u64) -> Result<BlockHash, AppError> {
    Ok(self.block_at_height(height).await?.hash)
  }

  async fn mempool_txids(&self) -> Result<HashSet<Txid>, AppError>;

  async fn transaction_by_id(&self, txid: &Txid) -> Result<Transaction, AppError>;

  fn chain_name(&self) -> &str;
}
