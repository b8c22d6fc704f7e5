use crate::shutdown::{cancelled, ShutdownReceiver};
use log::{debug, info, warn};
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Configuration for the pending-claim monitor
#[derive(Debug, Clone)]
pub struct UtxoMonitorConfig {
  /// Ticks after which a claim attempt is presumed abandoned.
  pub timeout: u32,
  pub tick_interval: Duration,
}

impl Default for UtxoMonitorConfig {
  fn default() -> Self {
    Self {
      timeout: 60,
      tick_interval: Duration::from_secs(1),
    }
  }
}

/// Per-utxo counters of pending claim attempts. Owned by the monitor task.
#[derive(Debug, Default)]
pub struct UtxoMonitorTable {
  counts: HashMap<String, u32>,
  timeout: u32,
}

impl UtxoMonitorTable {
  pub fn new(timeout: u32) -> Self {
    Self {
      counts: HashMap::new(),
      timeout,
    }
  }

  /// Starts tracking at zero; an already tracked id keeps its counter.
  pub fn track(&mut self, utxo_id: String) {
    self.counts.entry(utxo_id).or_insert(0);
  }

  pub fn untrack(&mut self, utxo_id: &str) -> bool {
    self.counts.remove(utxo_id).is_some()
  }

  pub fn count(&self, utxo_id: &str) -> Option<u32> {
    self.counts.get(utxo_id).copied()
  }

  pub fn len(&self) -> usize {
    self.counts.len()
  }

  pub fn is_empty(&self) -> bool {
    self.counts.is_empty()
  }

  /// Advances every counter by one and drops those reaching the timeout.
  pub fn tick(&mut self) -> Vec<String> {
    let timeout = self.timeout;
    let mut expired = Vec::new();
    self.counts.retain(|utxo_id, count| {
      *count += 1;
      if *count >= timeout {
        expired.push(utxo_id.clone());
        false
      } else {
        true
      }
    });
    expired
  }
}

enum MonitorCommand {
  Track(String),
  Untrack(String),
  Count(String, oneshot::Sender<Option<u32>>),
  Len(oneshot::Sender<usize>),
}

/// Query/update handle of the monitor task.
#[derive(Clone)]
pub struct UtxoMonitorHandle {
  sender: mpsc::Sender<MonitorCommand>,
}

impl UtxoMonitorHandle {
  pub async fn track(&self, utxo_id: &str) {
    self.send(MonitorCommand::Track(utxo_id.to_string())).await;
  }

  pub async fn untrack(&self, utxo_id: &str) {
    self.send(MonitorCommand::Untrack(utxo_id.to_string())).await;
  }

  pub async fn count(&self, utxo_id: &str) -> Option<u32> {
    let (reply, response) = oneshot::channel();
    self.send(MonitorCommand::Count(utxo_id.to_string(), reply)).await;
    response.await.ok().flatten()
  }

  pub async fn is_tracked(&self, utxo_id: &str) -> bool {
    self.count(utxo_id).await.is_some()
  }

  pub async fn len(&self) -> usize {
    let (reply, response) = oneshot::channel();
    self.send(MonitorCommand::Len(reply)).await;
    response.await.unwrap_or(0)
  }

  async fn send(&self, command: MonitorCommand) {
    if self.sender.send(command).await.is_err() {
      warn!("[UtxoMonitor] Monitor task is gone, command dropped");
    }
  }
}

pub fn spawn_utxo_monitor(
  config: UtxoMonitorConfig,
  shutdown: ShutdownReceiver,
) -> (UtxoMonitorHandle, JoinHandle<()>) {
  let (sender, receiver) = mpsc::channel(256);
  let handle = tokio::spawn(run_utxo_monitor(config, receiver, shutdown));
  (UtxoMonitorHandle { sender }, handle)
}

async fn run_utxo_monitor(
  config: UtxoMonitorConfig,
  mut receiver: mpsc::Receiver<MonitorCommand>,
  mut shutdown: ShutdownReceiver,
) {
  info!(
    "[UtxoMonitor] Starting with timeout {} x {:?}",
    config.timeout, config.tick_interval
  );

  let mut table = UtxoMonitorTable::new(config.timeout);
  let mut ticker = interval(config.tick_interval);
  ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
  ticker.tick().await;

  loop {
    tokio::select! {
      _ = cancelled(&mut shutdown) => break,
      _ = ticker.tick() => {
        for utxo_id in table.tick() {
          debug!("[UtxoMonitor] claim attempt on {} timed out", utxo_id);
        }
      }
      command = receiver.recv() => match command {
        Some(MonitorCommand::Track(utxo_id)) => table.track(utxo_id),
        Some(MonitorCommand::Untrack(utxo_id)) => {
          table.untrack(&utxo_id);
        }
        Some(MonitorCommand::Count(utxo_id, reply)) => {
          let _ = reply.send(table.count(&utxo_id));
        }
        Some(MonitorCommand::Len(reply)) => {
          let _ = reply.send(table.len());
        }
        None => break,
      },
    }
  }

  info!("[UtxoMonitor] Loop exited.");
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::shutdown::shutdown_channel;

  #[test]
  fn entry_expires_at_timeout() {
    let mut table = UtxoMonitorTable::new(3);
    table.track("aa_0".to_string());
    assert!(table.tick().is_empty());
    assert_eq!(table.count("aa_0"), Some(1));
    table.track("aa_0".to_string());
    assert_eq!(table.count("aa_0"), Some(1));
    assert!(table.tick().is_empty());
    assert_eq!(table.tick(), vec!["aa_0".to_string()]);
    assert_eq!(table.count("aa_0"), None);
  }

  #[test]
  fn untrack_removes_entry() {
    let mut table = UtxoMonitorTable::new(3);
    table.track("aa_0".to_string());
    assert!(table.untrack("aa_0"));
    assert!(table.is_empty());
  }

  #[tokio::test]
  async fn task_counts_and_expires() {
    let (stop, shutdown) = shutdown_channel();
    let config = UtxoMonitorConfig {
      timeout: 3,
      tick_interval: Duration::from_millis(20),
    };
    let (monitor, handle) = spawn_utxo_monitor(config, shutdown);

    monitor.track("aa_0").await;
    assert!(monitor.is_tracked("aa_0").await);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!monitor.is_tracked("aa_0").await);
    assert_eq!(monitor.len().await, 0);

    stop.send(true).unwrap();
    handle.await.unwrap();
  }
}
