use crate::coin::coin_trait::ChainQuerySource;
use crate::fetcher::fetcher::Poller;
use crate::types::{AppError, BlockSender};

use async_trait::async_trait;
use bitcoin::BlockHash;
use log::warn;
use std::sync::Arc;

/// Emits newly seen chain tips as unconfirmed blocks.
pub struct TipBlockPoller<C: ChainQuerySource> {
  client: Arc<C>,
  sender: BlockSender,
  watch_height: Option<u64>,
  watch_hash: Option<BlockHash>,
  max_catch_up: u64,
}

impl<C: ChainQuerySource> TipBlockPoller<C> {
  pub fn new(client: Arc<C>, sender: BlockSender, max_catch_up: u64) -> Self {
    Self {
      client,
      sender,
      watch_height: None,
      watch_hash: None,
      max_catch_up: max_catch_up.max(1),
    }
  }

  pub fn watch_height(&self) -> Option<u64> {
    self.watch_height
  }
}

#[async_trait]
impl<C: ChainQuerySource + 'static> Poller for TipBlockPoller<C> {
  async fn poll_once(&mut self) -> Result<usize, AppError> {
    let current_height = self.client.current_height().await?;

    let start = match self.watch_height {
      Some(last) if current_height > last => {
        (last + 1).max(current_height.saturating_sub(self.max_catch_up - 1))
      }
      Some(last) => {
        // same height or shorter chain: only a replaced tip is news
        let hash = self.client.block_hash(current_height).await?;
        if current_height == last && Some(hash) == self.watch_hash {
          return Ok(0);
        }
        current_height
      }
      None => current_height,
    };

    let mut emitted = 0;
    for height in start..=current_height {
      match self.client.block_at_height(height).await {
        Ok(mut block) => {
          block.confirmations = current_height - height + 1;
          let hash = block.hash;
          self.sender.send(block).await?;
          self.watch_hash = Some(hash);
          emitted += 1;
        }
        Err(e) if !e.is_transient() => {
          warn!("[{} TipBlocks] skipping malformed block {}: {}", self.client.chain_name(), height, e);
          self.watch_hash = None;
        }
        Err(e) => return Err(e),
      }
      self.watch_height = Some(height);
    }
    Ok(emitted)
  }

  fn name(&self) -> &'static str {
    "TipBlocks"
  }
}
