use crate::coin::coin_trait::ChainQuerySource;
use crate::fetcher::fetcher::Poller;
use crate::types::{AppError, BlockSender};

use async_trait::async_trait;
use bitcoin::BlockHash;
use log::{info, warn};
use std::collections::VecDeque;
use std::sync::Arc;

/// Emits blocks once they are `confirm_num` deep, in height order.
pub struct ConfirmedBlockPoller<C: ChainQuerySource> {
  client: Arc<C>,
  sender: BlockSender,
  confirm_num: u64,
  next_height: u64,
  recent: VecDeque<(u64, BlockHash)>,
  lookback: usize,
}

impl<C: ChainQuerySource> ConfirmedBlockPoller<C> {
  pub fn new(client: Arc<C>, sender: BlockSender, confirm_num: u64, start_height: u64, lookback: usize) -> Self {
    Self {
      client,
      sender,
      confirm_num,
      next_height: start_height,
      recent: VecDeque::with_capacity(lookback),
      lookback: lookback.max(1),
    }
  }

  pub fn next_height(&self) -> u64 {
    self.next_height
  }

  fn is_confirmed(&self, current_height: u64, height: u64) -> bool {
    current_height
      .checked_sub(self.confirm_num)
      .map_or(false, |deepest| deepest >= height)
  }

  fn remember(&mut self, height: u64, hash: BlockHash) {
    if self.recent.len() == self.lookback {
      self.recent.pop_front();
    }
    self.recent.push_back((height, hash));
  }

  /// Rewinds `next_height` to just above the fork point when the newest
  /// emitted block is no longer on the node's best chain.
  async fn check_reorg(&mut self) -> Result<(), AppError> {
    let Some(&(height, expected)) = self.recent.back() else {
      return Ok(());
    };
    if self.client.block_hash(height).await? == expected {
      return Ok(());
    }

    warn!(
      "[{} ConfirmedBlocks] block {} at height {} is no longer on the best chain",
      self.client.chain_name(),
      expected,
      height
    );

    let mut fork_index = None;
    for index in (0..self.recent.len() - 1).rev() {
      let (h, hash) = self.recent[index];
      if self.client.block_hash(h).await? == hash {
        fork_index = Some(index);
        break;
      }
    }

    let rewind_to = match fork_index {
      Some(index) => self.recent[index].0 + 1,
      None => self.recent[0].0,
    };
    self.recent.truncate(fork_index.map_or(0, |index| index + 1));
    info!(
      "[{} ConfirmedBlocks] rewinding from {} to {}",
      self.client.chain_name(),
      self.next_height,
      rewind_to
    );
    self.next_height = rewind_to;
    Ok(())
  }
}

#[async_trait]
impl<C: ChainQuerySource + 'static> Poller for ConfirmedBlockPoller<C> {
  async fn poll_once(&mut self) -> Result<usize, AppError> {
    let current_height = self.client.current_height().await?;
    self.check_reorg().await?;

    let mut emitted = 0;
    while self.is_confirmed(current_height, self.next_height) {
      let height = self.next_height;
      match self.client.block_at_height(height).await {
        Ok(mut block) => {
          block.confirmations = current_height - height + 1;
          self.remember(height, block.hash);
          self.sender.send(block).await?;
          emitted += 1;
        }
        Err(e) if !e.is_transient() => {
          warn!(
            "[{} ConfirmedBlocks] skipping malformed block {}: {}",
            self.client.chain_name(),
            height,
            e
          );
        }
        Err(e) => return Err(e),
      }
      self.next_height += 1;
    }
    Ok(emitted)
  }

  fn name(&self) -> &'static str {
    "ConfirmedBlocks"
  }
}
