use crate::coin::bitcoin::address::AddressCodec;
use crate::types::AppError;
use bitcoin::Network;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
  pub coin_type: String,
  #[serde(default)]
  pub coins: HashMap<String, CoinConfig>,
  pub federation: FederationSettings,
  #[serde(default)]
  pub watcher: WatcherSettings,
  #[serde(default)]
  pub repository: RepositorySettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CoinConfig {
  pub rpc_server: String,
  #[serde(default)]
  pub rpc_user: String,
  #[serde(default)]
  pub rpc_password: String,
  #[serde(default = "default_network")]
  pub network: String, // "bitcoin", "testnet", "regtest", "signet"
  #[serde(default = "default_confirm_block_num")]
  pub confirm_block_num: u64,
  #[serde(default)]
  pub first_block_height: u64,
  #[serde(default)]
  pub load_mode: LoadMode,
}

/// Where the UTXO index comes from at startup.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMode {
  /// Resume from the durable store and the persisted scan cursor.
  #[default]
  #[serde(rename = "leveldb", alias = "store")]
  Store,
  /// Ignore persisted state and rescan from `first_block_height`.
  #[serde(rename = "chain")]
  Chain,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FederationSettings {
  pub address: String,
  #[serde(default)]
  pub redeem_script: String, // hex
}

#[derive(Debug, Deserialize, Clone)]
pub struct WatcherSettings {
  #[serde(default = "default_utxo_timeout_secs")]
  pub utxo_timeout_secs: u32,
  #[serde(default = "default_monitor_interval_ms")]
  pub monitor_interval_ms: u64,
  #[serde(default = "default_confirm_interval_secs")]
  pub confirm_interval_secs: u64,
  #[serde(default = "default_tip_interval_secs")]
  pub tip_interval_secs: u64,
  #[serde(default = "default_mempool_interval_secs")]
  pub mempool_interval_secs: u64,
  #[serde(default = "default_reorg_lookback")]
  pub reorg_lookback: usize,
  #[serde(default = "default_deposit_channel_capacity")]
  pub deposit_channel_capacity: usize,
}

impl Default for WatcherSettings {
  fn default() -> Self {
    Self {
      utxo_timeout_secs: default_utxo_timeout_secs(),
      monitor_interval_ms: default_monitor_interval_ms(),
      confirm_interval_secs: default_confirm_interval_secs(),
      tip_interval_secs: default_tip_interval_secs(),
      mempool_interval_secs: default_mempool_interval_secs(),
      reorg_lookback: default_reorg_lookback(),
      deposit_channel_capacity: default_deposit_channel_capacity(),
    }
  }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RepositorySettings {
  #[serde(default)]
  pub memory_db: bool,
  #[serde(default)]
  pub rocksdb_path: Option<String>,
}

fn default_network() -> String {
  "bitcoin".to_string()
}

fn default_confirm_block_num() -> u64 {
  6
}

fn default_utxo_timeout_secs() -> u32 {
  60
}

fn default_monitor_interval_ms() -> u64 {
  1000
}

fn default_confirm_interval_secs() -> u64 {
  10
}

fn default_tip_interval_secs() -> u64 {
  5
}

fn default_mempool_interval_secs() -> u64 {
  3
}

fn default_reorg_lookback() -> usize {
  12
}

fn default_deposit_channel_capacity() -> usize {
  100
}

impl Settings {
  pub fn new() -> Result<Self, config::ConfigError> {
    let config_path = std::env::var("MORTGAGE_WATCHER_CONFIG")
      .unwrap_or_else(|_| "./config.toml".to_string());
    let env_prefix = "APP"; // e.g. APP_COINS__BTC__RPC_SERVER=http://...

    let builder = config::Config::builder()
      .add_source(config::File::with_name(&config_path).required(true))
      .add_source(config::Environment::with_prefix(env_prefix).separator("__"));

    builder.build()?.try_deserialize()
  }

  pub fn coin_config(&self) -> Result<&CoinConfig, AppError> {
    self.coins.get(&self.coin_type.to_lowercase()).ok_or_else(|| {
      AppError::Config(format!("No [coins.{}] section configured", self.coin_type))
    })
  }

  pub fn rocksdb_path(&self) -> String {
    self.repository
      .rocksdb_path
      .clone()
      .unwrap_or_else(|| format!("./data/{}_db", self.coin_type.to_lowercase()))
  }
}

pub fn parse_network(name: &str) -> Result<Network, AppError> {
  match name.to_lowercase().as_str() {
    "bitcoin" | "mainnet" => Ok(Network::Bitcoin),
    "testnet" => Ok(Network::Testnet),
    "regtest" => Ok(Network::Regtest),
    "signet" => Ok(Network::Signet),
    other => Err(AppError::Config(format!("Unknown network '{}'", other))),
  }
}

/// Resolved configuration handed to every component constructor.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
  pub coin_type: String,
  pub network: Network,
  pub confirm_block_num: u64,
  pub first_block_height: u64,
  pub load_mode: LoadMode,
  /// Canonical encoding of the configured federation address.
  pub federation_address: String,
  pub redeem_script: Vec<u8>,
  pub utxo_timeout: u32,
  pub monitor_interval: Duration,
  pub confirm_poll_interval: Duration,
  pub tip_poll_interval: Duration,
  pub mempool_poll_interval: Duration,
  pub reorg_lookback: usize,
  pub deposit_channel_capacity: usize,
}

impl WatcherConfig {
  pub fn from_settings(settings: &Settings) -> Result<Self, AppError> {
    let coin = settings.coin_config()?;
    let network = parse_network(&coin.network)?;
    let coin_type = settings.coin_type.to_lowercase();

    let codec = AddressCodec::new(&coin_type, network);
    let federation_address = codec
      .decode(&settings.federation.address)
      .map_err(|e| AppError::Config(format!("Invalid federation address: {}", e)))?
      .to_string();

    let redeem_script = hex::decode(settings.federation.redeem_script.trim())
      .map_err(|e| AppError::Config(format!("Invalid redeem script hex: {}", e)))?;

    let watcher = &settings.watcher;
    Ok(Self {
      coin_type,
      network,
      confirm_block_num: coin.confirm_block_num,
      first_block_height: coin.first_block_height,
      load_mode: coin.load_mode,
      federation_address,
      redeem_script,
      utxo_timeout: watcher.utxo_timeout_secs,
      monitor_interval: Duration::from_millis(watcher.monitor_interval_ms),
      confirm_poll_interval: Duration::from_secs(watcher.confirm_interval_secs),
      tip_poll_interval: Duration::from_secs(watcher.tip_interval_secs),
      mempool_poll_interval: Duration::from_secs(watcher.mempool_interval_secs),
      reorg_lookback: watcher.reorg_lookback.max(1),
      deposit_channel_capacity: watcher.deposit_channel_capacity.max(1),
    })
  }

  pub fn address_codec(&self) -> AddressCodec {
    AddressCodec::new(&self.coin_type, self.network)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn settings(address: &str, network: &str) -> Settings {
    let mut coins = HashMap::new();
    coins.insert(
      "btc".to_string(),
      CoinConfig {
        rpc_server: "http://127.0.0.1:8332".to_string(),
        rpc_user: String::new(),
        rpc_password: String::new(),
        network: network.to_string(),
        confirm_block_num: 3,
        first_block_height: 100,
        load_mode: LoadMode::Store,
      },
    );
    Settings {
      coin_type: "BTC".to_string(),
      coins,
      federation: FederationSettings {
        address: address.to_string(),
        redeem_script: "5121".to_string(),
      },
      watcher: WatcherSettings::default(),
      repository: RepositorySettings::default(),
    }
  }

  #[test]
  fn resolves_watcher_config() {
    let config = WatcherConfig::from_settings(&settings("3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy", "bitcoin")).unwrap();
    assert_eq!(config.coin_type, "btc");
    assert_eq!(config.confirm_block_num, 3);
    assert_eq!(config.first_block_height, 100);
    assert_eq!(config.redeem_script, vec![0x51, 0x21]);
    assert_eq!(config.federation_address, "3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy");
  }

  #[test]
  fn federation_address_on_wrong_network_is_fatal() {
    let err = WatcherConfig::from_settings(&settings("3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy", "regtest")).unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
  }

  #[test]
  fn load_mode_accepts_legacy_name() {
    let mode: LoadMode = serde_json::from_str("\"leveldb\"").unwrap();
    assert_eq!(mode, LoadMode::Store);
    let mode: LoadMode = serde_json::from_str("\"chain\"").unwrap();
    assert_eq!(mode, LoadMode::Chain);
  }
}
