/**
* filename : mortgage_watcher
* description: Turns watcher events into ledger transitions and deposit events.
**/

use crate::analyzer::payload::{parse_payload_script, Message};
use crate::analyzer::types::{HashMapping, SubTransaction};
use crate::analyzer::utils::satoshi_to_btc;
use crate::coin::bitcoin::address::AddressCodec;
use crate::coin::bitcoin::model::{utxo_id, BlockData, SpendType, UtxoInfo};
use crate::config::{LoadMode, WatcherConfig};
use crate::fetcher::WatcherStreams;
use crate::ledger::{KeyLayout, UtxoLedger, CONFIRM_HEIGHT_KEY};
use crate::respository::LedgerStore;
use crate::shutdown::{cancelled, ShutdownReceiver};
use crate::tasks::UtxoMonitorHandle;
use crate::types::{AppError, DepositSender};

use bitcoin::Transaction;
use log::{debug, error, info, warn};
use std::sync::Arc;

pub struct MortgageWatcher {
  config: WatcherConfig,
  codec: AddressCodec,
  keys: KeyLayout,
  store: Arc<dyn LedgerStore>,
  ledger: Arc<UtxoLedger>,
  monitor: UtxoMonitorHandle,
  deposit_sender: DepositSender,
  scan_confirm_height: u64,
}

/// Reads the persisted scan cursor.
pub async fn load_confirm_height(store: &dyn LedgerStore) -> Result<Option<u64>, AppError> {
  match store.get(CONFIRM_HEIGHT_KEY.as_bytes()).await? {
    Some(raw) => {
      let text = String::from_utf8_lossy(&raw);
      text.trim().parse::<u64>().map(Some).map_err(|e| {
        AppError::Initialization(format!("Corrupt {} value '{}': {}", CONFIRM_HEIGHT_KEY, text, e))
      })
    }
    None => Ok(None),
  }
}

impl MortgageWatcher {
  pub async fn new(
    config: &WatcherConfig,
    store: Arc<dyn LedgerStore>,
    monitor: UtxoMonitorHandle,
    deposit_sender: DepositSender,
  ) -> Result<Self, AppError> {
    let keys = KeyLayout::new(&config.coin_type);
    let ledger = Arc::new(UtxoLedger::new(store.clone(), keys.clone()));

    let mut scan_confirm_height = config.first_block_height;
    match config.load_mode {
      LoadMode::Store => {
        if let Some(height) = load_confirm_height(store.as_ref()).await? {
          debug!("[{} MortgageWatcher] persisted confirm height {}", config.coin_type, height);
          scan_confirm_height = scan_confirm_height.max(height);
        }
        ledger.load_from_store().await?;
      }
      LoadMode::Chain => {
        info!(
          "[{} MortgageWatcher] load_mode = chain, re-deriving utxos from height {}",
          config.coin_type, scan_confirm_height
        );
      }
    }

    info!(
      "[{} MortgageWatcher] federation {} | scan from {} | {} utxos loaded",
      config.coin_type,
      config.federation_address,
      scan_confirm_height,
      ledger.len().await
    );

    Ok(Self {
      config: config.clone(),
      codec: config.address_codec(),
      keys,
      store,
      ledger,
      monitor,
      deposit_sender,
      scan_confirm_height,
    })
  }

  pub fn scan_confirm_height(&self) -> u64 {
    self.scan_confirm_height
  }

  pub fn ledger(&self) -> Arc<UtxoLedger> {
    self.ledger.clone()
  }

  pub fn federation_address(&self) -> &str {
    &self.config.federation_address
  }

  pub fn redeem_script(&self) -> &[u8] {
    &self.config.redeem_script
  }

  pub async fn get_utxo_info_by_id(&self, utxo_id: &str) -> Option<UtxoInfo> {
    self.ledger.lookup(utxo_id).await
  }

  /// Signed txid recorded for a pre-signature hash.
  pub async fn hash_after_sign(&self, hash_before_sign: &str) -> Result<Option<String>, AppError> {
    let key = self.keys.hash_mapping_key(hash_before_sign);
    Ok(self
      .store
      .get(key.as_bytes())
      .await?
      .map(|raw| String::from_utf8_lossy(&raw).into_owned()))
  }

  pub async fn is_federation_tx(&self, hash: &str) -> Result<bool, AppError> {
    let key = self.keys.fa_tx_key(hash);
    Ok(self.store.get(key.as_bytes()).await?.is_some())
  }

  /// Serially applies the three watcher streams until shutdown.
  pub async fn run(mut self, mut streams: WatcherStreams, mut shutdown: ShutdownReceiver) {
    info!("[{} MortgageWatcher] Starting loop...", self.config.coin_type);

    loop {
      tokio::select! {
        biased;
        _ = cancelled(&mut shutdown) => break,
        Some(block) = streams.confirmed.recv() => {
          info!("[{} MortgageWatcher] process confirm block height: {}", self.config.coin_type, block.height);
          if let Err(e) = self.process_confirm_block(&block).await {
            error!("[{} MortgageWatcher] ❌ deposit consumer gone: {}", self.config.coin_type, e);
            break;
          }
        }
        Some(tx) = streams.new_tx.recv() => self.process_new_tx(&tx).await,
        Some(block) = streams.tip.recv() => {
          info!("[{} MortgageWatcher] process new block height: {}", self.config.coin_type, block.height);
          self.process_unconfirm_block(&block).await;
        }
        else => break,
      }
    }

    info!("[{} MortgageWatcher] Loop finished.", self.config.coin_type);
  }

  /// Final spend-state transitions for one confirmed block. Fails only when
  /// the deposit channel is closed.
  pub async fn process_confirm_block(&mut self, block: &BlockData) -> Result<(), AppError> {
    if block.height < self.scan_confirm_height {
      warn!(
        "[{} MortgageWatcher] confirm block height roll back: {} < {}",
        self.config.coin_type, block.height, self.scan_confirm_height
      );
      match self.reconcile_rollback(block.height).await {
        Ok(touched) => info!(
          "[{} MortgageWatcher] reconciled {} utxos from height {}",
          self.config.coin_type, touched, block.height
        ),
        Err(e) => error!("[{} MortgageWatcher] reconcile from {} failed: {}", self.config.coin_type, block.height, e),
      }
    }

    for tx in block.transactions() {
      self.process_confirm_tx(tx, block.height, block.confirmations).await?;
    }

    self.advance_scan_height(block.height + 1).await;
    Ok(())
  }

  async fn process_confirm_tx(&self, tx: &Transaction, height: u64, confirmations: u64) -> Result<(), AppError> {
    let txid = tx.compute_txid().to_string();

    let mut from_federation = false;
    for input in &tx.input {
      let spent_id = utxo_id(&input.previous_output.txid.to_string(), input.previous_output.vout);
      if let Some(mut utxo) = self.ledger.lookup(&spent_id).await {
        if utxo.spend_type == SpendType::Removed {
          continue;
        }
        from_federation = true;
        if utxo.spend_type != SpendType::Spent {
          utxo.spend_type = SpendType::Spent;
          utxo.spent_height = Some(height);
          self.ledger.upsert(utxo).await;
        }
        self.ledger.evict(&spent_id).await;
        self.monitor.untrack(&spent_id).await;
      }
    }

    if from_federation {
      self.store_hash_mapping(tx).await;
    }

    let mut pays_federation = false;
    let mut value = 0u64;
    let mut message: Option<Message> = None;

    for (index, output) in tx.output.iter().enumerate() {
      match self.codec.extract(&output.script_pubkey) {
        Some(address) => {
          if address != self.config.federation_address {
            continue;
          }
          pays_federation = true;
          value += output.value.to_sat();

          let id = utxo_id(&txid, index as u32);
          let utxo = match self.ledger.lookup(&id).await {
            Some(mut existing) => {
              // a mempool spend can move the entry past Confirmed before its
              // funding block arrives; the first confirmation height still applies
              if existing.spend_type < SpendType::Confirmed || existing.block_height == 0 {
                existing.block_height = height;
              }
              existing.spend_type = existing.spend_type.max(SpendType::Confirmed);
              existing.confirmations = confirmations;
              existing
            }
            None => {
              if self.already_spent(&id).await {
                debug!("[{} MortgageWatcher] utxo {} already spent, not re-adding", self.config.coin_type, id);
                continue;
              }
              let mut created = UtxoInfo::new(address, txid.clone(), index as u32, output.value.to_sat(), SpendType::Confirmed);
              created.block_height = height;
              created.confirmations = confirmations;
              created
            }
          };
          self.ledger.upsert(utxo).await;
          debug!(
            "[{} MortgageWatcher] FIND NEW UTXO {} value {}",
            self.config.coin_type, id, output.value.to_sat()
          );
        }
        None => {
          if message.is_some() {
            continue;
          }
          match parse_payload_script(&output.script_pubkey) {
            Ok(parsed) => message = Some(parsed),
            Err(e) => debug!("[{} MortgageWatcher] {}:{} not a routing output: {}", self.config.coin_type, txid, index, e),
          }
        }
      }
    }

    if let (true, Some(message)) = (pays_federation, message) {
      self.emit_deposit(&txid, value, message).await?;
    }
    Ok(())
  }

  /// Provisional transitions for an unconfirmed transaction.
  pub async fn process_new_tx(&self, tx: &Transaction) {
    let txid = tx.compute_txid().to_string();

    let mut from_federation = false;
    for input in &tx.input {
      let spent_id = utxo_id(&input.previous_output.txid.to_string(), input.previous_output.vout);
      let Some(mut utxo) = self.ledger.lookup(&spent_id).await else {
        continue;
      };
      from_federation = true;
      match utxo.spend_type {
        SpendType::Pending | SpendType::Confirmed => {
          utxo.spend_type = SpendType::Spending;
          self.ledger.upsert(utxo).await;
          self.monitor.track(&spent_id).await;
        }
        SpendType::Removed => {
          debug!("[{} MortgageWatcher] {} spends removed utxo {}", self.config.coin_type, txid, spent_id);
        }
        SpendType::Spending | SpendType::Spent => {}
      }
    }

    for (index, output) in tx.output.iter().enumerate() {
      let Some(address) = self.codec.extract(&output.script_pubkey) else {
        continue;
      };
      if address != self.config.federation_address {
        continue;
      }
      let id = utxo_id(&txid, index as u32);
      if self.ledger.contains(&id).await || self.already_spent(&id).await {
        continue;
      }
      let utxo = UtxoInfo::new(address, txid.clone(), index as u32, output.value.to_sat(), SpendType::Pending);
      self.ledger.upsert(utxo).await;
      debug!("[{} MortgageWatcher] pending utxo {}", self.config.coin_type, id);
    }

    if from_federation {
      info!("[{} MortgageWatcher] process tx {}", self.config.coin_type, txid);
      self.store_hash_mapping(tx).await;
    }
  }

  pub async fn process_unconfirm_block(&self, block: &BlockData) {
    for tx in block.transactions() {
      self.process_new_tx(tx).await;
    }
  }

  /// Undoes state derived from blocks at or above `from_height`; the replay
  /// that follows re-derives it from the new chain.
  ///
  /// UTXOs created at or above the height become `Removed` and leave the
  /// index; the replay re-creates them if they are confirmed again. UTXOs whose
  /// spend was confirmed at or above it return to `Confirmed`.
  pub async fn reconcile_rollback(&self, from_height: u64) -> Result<usize, AppError> {
    let mut touched = 0;
    for (id, mut utxo) in self.ledger.persisted_utxos().await? {
      let created_above = utxo.block_height >= from_height
        && matches!(utxo.spend_type, SpendType::Confirmed | SpendType::Spending | SpendType::Spent);
      let spent_above = utxo.spent_height.map_or(false, |h| h >= from_height);

      if created_above {
        utxo.spend_type = SpendType::Removed;
        utxo.spent_height = None;
      } else if spent_above {
        utxo.spend_type = SpendType::Confirmed;
        utxo.spent_height = None;
      } else {
        continue;
      }

      debug!("[{} MortgageWatcher] reconcile {} -> {:?}", self.config.coin_type, id, utxo.spend_type);
      self.monitor.untrack(&id).await;
      let removed = utxo.spend_type == SpendType::Removed;
      self.ledger.upsert(utxo).await;
      if removed {
        self.ledger.evict(&id).await;
      }
      touched += 1;
    }
    Ok(touched)
  }

  /// A UTXO whose durable record is already `Spent` is never resurrected.
  async fn already_spent(&self, utxo_id: &str) -> bool {
    match self.ledger.persisted(utxo_id).await {
      Ok(record) => record.map_or(false, |utxo| utxo.spend_type.is_terminal()),
      Err(e) => {
        warn!("[{} MortgageWatcher] read utxo {} failed: {}", self.config.coin_type, utxo_id, e);
        false
      }
    }
  }

  async fn emit_deposit(&self, txid: &str, value: u64, message: Message) -> Result<(), AppError> {
    let marker = self.keys.mortgage_key(txid);
    match self.store.get(marker.as_bytes()).await {
      Ok(Some(_)) => {
        debug!("[{} MortgageWatcher] deposit {} already emitted", self.config.coin_type, txid);
        return Ok(());
      }
      Ok(None) => {}
      Err(e) => warn!("[{} MortgageWatcher] deposit marker read for {} failed: {}", self.config.coin_type, txid, e),
    }

    let mortgage_tx = SubTransaction::new(
      txid.to_string(),
      value,
      self.config.coin_type.clone(),
      message.chain_name,
      message.app_number,
      message.address,
    );

    info!(
      "[{} MortgageWatcher] ✅ push mortgage tx {} | {} {} -> {} app {} ({})",
      self.config.coin_type,
      txid,
      satoshi_to_btc(value),
      self.config.coin_type,
      mortgage_tx.to,
      mortgage_tx.token_to,
      mortgage_tx.recharge_list[0].address
    );

    self.deposit_sender.send(mortgage_tx).await?;

    if let Err(e) = self.store.put(marker.as_bytes(), txid.as_bytes()).await {
      warn!("[{} MortgageWatcher] save deposit marker {} failed: {}", self.config.coin_type, txid, e);
    }
    Ok(())
  }

  async fn store_hash_mapping(&self, tx: &Transaction) -> bool {
    let mapping = HashMapping::from_transaction(tx);
    let before = mapping.hash_before_sign.to_string();
    let after = mapping.hash_after_sign.to_string();
    debug!(
      "[{} MortgageWatcher] storeHashMap before {} after {}",
      self.config.coin_type, before, after
    );

    let mapping_key = self.keys.hash_mapping_key(&before);
    if let Err(e) = self.store.put(mapping_key.as_bytes(), after.as_bytes()).await {
      warn!("[{} MortgageWatcher] save hashmap failed: {}", self.config.coin_type, e);
      return false;
    }

    let tx_key = self.keys.fa_tx_key(&after);
    if let Err(e) = self.store.put(tx_key.as_bytes(), after.as_bytes()).await {
      warn!("[{} MortgageWatcher] save federation hash failed: {}", self.config.coin_type, e);
      return false;
    }
    true
  }

  async fn advance_scan_height(&mut self, next_height: u64) {
    self.scan_confirm_height = next_height;
    let value = next_height.to_string();
    if let Err(e) = self.store.put(CONFIRM_HEIGHT_KEY.as_bytes(), value.as_bytes()).await {
      error!(
        "[{} MortgageWatcher] Save confirmHeight {} failed: {}",
        self.config.coin_type, value, e
      );
    }
  }
}
