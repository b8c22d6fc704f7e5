/**
* filename : block_watcher
* description: Wires the confirmed, tip and mempool pollers to their channels.
**/

use crate::coin::coin_trait::ChainQuerySource;
use crate::config::WatcherConfig;
use crate::fetcher::{ConfirmedBlockPoller, MempoolPoller, TipBlockPoller};
use crate::shutdown::ShutdownReceiver;
use crate::tasks::spawn_poller;
use crate::types::{BlockReceiver, TxReceiver};

use log::info;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const CONFIRM_CHANNEL_CAPACITY: usize = 32;
const TIP_CHANNEL_CAPACITY: usize = 32;
const NEW_TX_CHANNEL_CAPACITY: usize = 100;

/// The three event streams consumed by the orchestrator.
pub struct WatcherStreams {
  pub confirmed: BlockReceiver,
  pub tip: BlockReceiver,
  pub new_tx: TxReceiver,
}

pub struct BlockWatcher<C: ChainQuerySource> {
  client: Arc<C>,
  config: WatcherConfig,
  start_height: u64,
}

impl<C: ChainQuerySource + 'static> BlockWatcher<C> {
  pub fn new(client: Arc<C>, config: &WatcherConfig, start_height: u64) -> Self {
    Self {
      client,
      config: config.clone(),
      start_height,
    }
  }

  /// Spawns one task per stream. Each stops between cycles on shutdown.
  pub fn spawn(self, shutdown: ShutdownReceiver) -> (WatcherStreams, Vec<JoinHandle<()>>) {
    let (confirm_tx, confirmed) = mpsc::channel(CONFIRM_CHANNEL_CAPACITY);
    let (tip_tx, tip) = mpsc::channel(TIP_CHANNEL_CAPACITY);
    let (new_tx_tx, new_tx) = mpsc::channel(NEW_TX_CHANNEL_CAPACITY);

    info!(
      "[{} BlockWatcher] confirmed scan from {} with {} confirmations",
      self.client.chain_name(),
      self.start_height,
      self.config.confirm_block_num
    );

    let confirmed_poller = ConfirmedBlockPoller::new(
      self.client.clone(),
      confirm_tx,
      self.config.confirm_block_num,
      self.start_height,
      self.config.reorg_lookback,
    );
    let tip_poller = TipBlockPoller::new(
      self.client.clone(),
      tip_tx,
      self.config.confirm_block_num.max(1),
    );
    let mempool_poller = MempoolPoller::new(self.client, new_tx_tx);

    let handles = vec![
      spawn_poller(confirmed_poller, self.config.confirm_poll_interval, shutdown.clone()),
      spawn_poller(tip_poller, self.config.tip_poll_interval, shutdown.clone()),
      spawn_poller(mempool_poller, self.config.mempool_poll_interval, shutdown),
    ];

    (WatcherStreams { confirmed, tip, new_tx }, handles)
  }
}
