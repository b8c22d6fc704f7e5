/**
* filename : fetcher
* description: One polling stream of the block watcher.
**/

use crate::types::AppError;
use async_trait::async_trait;

#[async_trait]
pub trait Poller: Send {
  /// Runs one poll cycle and returns how many items were emitted.
  async fn poll_once(&mut self) -> Result<usize, AppError>;

  fn name(&self) -> &'static str;
}
