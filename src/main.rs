// src/main.rs
/**
* description: Entry point for the federation deposit watcher.
**/

use mortgage_watcher::analyzer::MortgageWatcher;
use mortgage_watcher::coin::bitcoin::client::BitcoinRpcClient;
use mortgage_watcher::config::{Settings, WatcherConfig};
use mortgage_watcher::fetcher::BlockWatcher;
use mortgage_watcher::respository::{LedgerStore, StoreWrapper};
use mortgage_watcher::shutdown::{shutdown_channel, shutdown_signal};
use mortgage_watcher::tasks::{spawn_utxo_monitor, UtxoMonitorConfig};
use mortgage_watcher::types::{AppError, DepositReceiver};

use log::{error, info};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Stand-in consumer for the deposit stream: logs each event as JSON.
async fn run_deposit_logger(mut receiver: DepositReceiver) {
  while let Some(deposit) = receiver.recv().await {
    match serde_json::to_string(&deposit) {
      Ok(json) => info!("[Deposit] {}", json),
      Err(e) => error!("[Deposit] Failed to serialize {}: {}", deposit.sc_txid, e),
    }
  }
  info!("[Deposit] Stream closed.");
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
  // 1. Initialize logging
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
  info!("Application starting...");

  // 2. Load configuration
  let settings = Settings::new()?;
  let watcher_config = WatcherConfig::from_settings(&settings)?;
  let coin_config = settings.coin_config()?;
  info!(
    "Configuration loaded. coin = {}, federation = {}",
    watcher_config.coin_type, watcher_config.federation_address
  );

  // 3. Open the ledger store
  let store: Arc<dyn LedgerStore> = Arc::new(StoreWrapper::from_settings(&settings)?);

  // 4. Create the RPC client
  let client = Arc::new(BitcoinRpcClient::new(
    &watcher_config.coin_type,
    coin_config.rpc_server.clone(),
    coin_config.rpc_user.clone(),
    coin_config.rpc_password.clone(),
  )?);

  // 5. Shutdown channel and claim monitor
  let (shutdown_tx, shutdown_rx) = shutdown_channel();
  let (monitor, monitor_handle) = spawn_utxo_monitor(
    UtxoMonitorConfig {
      timeout: watcher_config.utxo_timeout,
      tick_interval: watcher_config.monitor_interval,
    },
    shutdown_rx.clone(),
  );

  // 6. Build the orchestrator (loads persisted state)
  let (deposit_sender, deposit_receiver) = mpsc::channel(watcher_config.deposit_channel_capacity);
  let watcher = MortgageWatcher::new(&watcher_config, store, monitor, deposit_sender).await?;

  // 7. Spawn pollers from the persisted scan cursor
  let block_watcher = BlockWatcher::new(client, &watcher_config, watcher.scan_confirm_height());
  let (streams, poller_handles) = block_watcher.spawn(shutdown_rx.clone());

  // 8. Spawn orchestrator and deposit consumer
  let watcher_handle = tokio::spawn(watcher.run(streams, shutdown_rx));
  let deposit_handle = tokio::spawn(run_deposit_logger(deposit_receiver));

  // 9. Wait for shutdown signal
  shutdown_signal().await;
  info!("Shutdown signal received. Waiting for tasks to finish...");
  let _ = shutdown_tx.send(true);

  // 10. Gracefully wait
  for handle in poller_handles {
    let _ = handle.await;
  }
  let _ = watcher_handle.await;
  let _ = monitor_handle.await;
  let _ = deposit_handle.await;

  info!("Application exited cleanly.");
  Ok(())
}
