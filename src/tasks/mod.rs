/**
* filename : tasks
* description: Spawn helpers for the long-running tasks.
**/
pub mod utxo_monitor;

pub use utxo_monitor::{spawn_utxo_monitor, UtxoMonitorConfig, UtxoMonitorHandle, UtxoMonitorTable};

use std::time::Duration;
use tokio::task::JoinHandle;

use crate::fetcher::fetcher::Poller;
use crate::fetcher::runner::run_poller;
use crate::shutdown::ShutdownReceiver;

pub fn spawn_poller<P: Poller + 'static>(
  poller: P,
  interval: Duration,
  shutdown: ShutdownReceiver,
) -> JoinHandle<()> {
  tokio::spawn(run_poller(poller, interval, shutdown))
}
