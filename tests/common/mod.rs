#![allow(dead_code)]

use async_trait::async_trait;
use bitcoin::absolute::LockTime;
use bitcoin::address::NetworkUnchecked;
use bitcoin::block::{Header, Version as BlockVersion};
use bitcoin::hashes::Hash;
use bitcoin::opcodes::all::OP_RETURN;
use bitcoin::script::{Builder, PushBytesBuf};
use bitcoin::transaction::Version;
use bitcoin::{
  Address, Amount, Block, BlockHash, CompactTarget, Network, OutPoint, ScriptBuf, Sequence, Transaction, TxIn,
  TxMerkleNode, TxOut, Txid, Witness,
};
use mortgage_watcher::analyzer::PAYLOAD_MAGIC;
use mortgage_watcher::coin::bitcoin::model::BlockData;
use mortgage_watcher::coin::coin_trait::ChainQuerySource;
use mortgage_watcher::config::{LoadMode, WatcherConfig};
use mortgage_watcher::types::AppError;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

pub const FEDERATION_ADDRESS: &str = "3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy";
pub const OTHER_ADDRESS: &str = "1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2";

#[derive(Default)]
struct ChainState {
  blocks: Vec<Block>,
  mempool: Vec<Transaction>,
  malformed_heights: HashSet<u64>,
  failing_txs: HashSet<Txid>,
  offline: bool,
  nonce: u32,
}

/// In-memory node: heights index `blocks`, the genesis is height 0.
pub struct MockChain {
  state: Mutex<ChainState>,
}

impl MockChain {
  pub fn new() -> Self {
    let chain = Self {
      state: Mutex::new(ChainState::default()),
    };
    chain.push_block(Vec::new());
    chain
  }

  /// Chain with empty blocks up to `tip`.
  pub fn with_height(tip: u64) -> Self {
    let chain = Self::new();
    for _ in 0..tip {
      chain.push_block(Vec::new());
    }
    chain
  }

  pub fn push_block(&self, txs: Vec<Transaction>) -> u64 {
    let mut state = self.state.lock().unwrap();
    state.nonce += 1;
    let block = make_block(state.nonce, txs);
    state.blocks.push(block);
    state.blocks.len() as u64 - 1
  }

  /// Drops every block from `height` up and appends `count` fresh ones.
  pub fn reorg_from(&self, height: u64, count: usize) {
    {
      let mut state = self.state.lock().unwrap();
      state.blocks.truncate(height as usize);
    }
    for _ in 0..count {
      self.push_block(Vec::new());
    }
  }

  pub fn hash_at(&self, height: u64) -> BlockHash {
    self.state.lock().unwrap().blocks[height as usize].block_hash()
  }

  pub fn set_mempool(&self, txs: Vec<Transaction>) {
    self.state.lock().unwrap().mempool = txs;
  }

  pub fn mark_malformed(&self, height: u64) {
    self.state.lock().unwrap().malformed_heights.insert(height);
  }

  pub fn fail_tx(&self, txid: Txid, failing: bool) {
    let mut state = self.state.lock().unwrap();
    if failing {
      state.failing_txs.insert(txid);
    } else {
      state.failing_txs.remove(&txid);
    }
  }

  pub fn set_offline(&self, offline: bool) {
    self.state.lock().unwrap().offline = offline;
  }
}

#[async_trait]
impl ChainQuerySource for MockChain {
  async fn current_height(&self) -> Result<u64, AppError> {
    let state = self.state.lock().unwrap();
    if state.offline {
      return Err(AppError::Client("connection refused".to_string()));
    }
    Ok(state.blocks.len() as u64 - 1)
  }

  async fn block_at_height(&self, height: u64) -> Result<BlockData, AppError> {
    let state = self.state.lock().unwrap();
    if state.offline {
      return Err(AppError::Client("connection refused".to_string()));
    }
    if state.malformed_heights.contains(&height) {
      return Err(AppError::Decode(format!("block {} truncated", height)));
    }
    state
      .blocks
      .get(height as usize)
      .cloned()
      .map(|block| BlockData::new(height, block))
      .ok_or_else(|| AppError::Rpc {
        code: -8,
        message: "Block height out of range".to_string(),
      })
  }

  async fn mempool_txids(&self) -> Result<HashSet<Txid>, AppError> {
    let state = self.state.lock().unwrap();
    Ok(state.mempool.iter().map(|tx| tx.compute_txid()).collect())
  }

  async fn transaction_by_id(&self, txid: &Txid) -> Result<Transaction, AppError> {
    let state = self.state.lock().unwrap();
    if state.failing_txs.contains(txid) {
      return Err(AppError::Client("timeout".to_string()));
    }
    state
      .mempool
      .iter()
      .find(|tx| tx.compute_txid() == *txid)
      .cloned()
      .ok_or_else(|| AppError::Rpc {
        code: -5,
        message: "No such mempool or blockchain transaction".to_string(),
      })
  }

  fn chain_name(&self) -> &str {
    "BTC"
  }
}

fn make_block(nonce: u32, txdata: Vec<Transaction>) -> Block {
  Block {
    header: Header {
      version: BlockVersion::ONE,
      prev_blockhash: BlockHash::all_zeros(),
      merkle_root: TxMerkleNode::all_zeros(),
      time: 1_700_000_000 + nonce,
      bits: CompactTarget::from_consensus(0x207f_ffff),
      nonce,
    },
    txdata,
  }
}

pub fn block_data(height: u64, txs: Vec<Transaction>) -> BlockData {
  let mut data = BlockData::new(height, make_block(height as u32, txs));
  data.confirmations = 6;
  data
}

pub fn address_script(address: &str) -> ScriptBuf {
  address
    .parse::<Address<NetworkUnchecked>>()
    .unwrap()
    .require_network(Network::Bitcoin)
    .unwrap()
    .script_pubkey()
}

pub fn pay(address: &str, sats: u64) -> TxOut {
  TxOut {
    value: Amount::from_sat(sats),
    script_pubkey: address_script(address),
  }
}

pub fn data_output(pushes: &[&[u8]]) -> TxOut {
  let mut builder = Builder::new().push_opcode(OP_RETURN);
  for push in pushes {
    builder = builder.push_slice(PushBytesBuf::try_from(push.to_vec()).unwrap());
  }
  TxOut {
    value: Amount::ZERO,
    script_pubkey: builder.into_script(),
  }
}

pub fn routing_output(chain: &str, app_number: u32, address: &str) -> TxOut {
  data_output(&[&PAYLOAD_MAGIC, chain.as_bytes(), &app_number.to_be_bytes(), address.as_bytes()])
}

/// Outpoint of some transaction the watcher has never seen.
pub fn foreign_outpoint(seed: u8) -> OutPoint {
  OutPoint::new(Txid::from_byte_array([seed; 32]), 0)
}

pub fn transaction(inputs: Vec<OutPoint>, outputs: Vec<TxOut>) -> Transaction {
  Transaction {
    version: Version::TWO,
    lock_time: LockTime::ZERO,
    input: inputs
      .into_iter()
      .map(|previous_output| TxIn {
        previous_output,
        script_sig: ScriptBuf::from_bytes(vec![0x51]),
        sequence: Sequence::MAX,
        witness: Witness::new(),
      })
      .collect(),
    output: outputs,
  }
}

pub fn watcher_config(load_mode: LoadMode) -> WatcherConfig {
  WatcherConfig {
    coin_type: "btc".to_string(),
    network: Network::Bitcoin,
    confirm_block_num: 6,
    first_block_height: 100,
    load_mode,
    federation_address: FEDERATION_ADDRESS.to_string(),
    redeem_script: vec![0x52, 0xae],
    utxo_timeout: 60,
    monitor_interval: Duration::from_secs(1),
    confirm_poll_interval: Duration::from_millis(20),
    tip_poll_interval: Duration::from_millis(20),
    mempool_poll_interval: Duration::from_millis(20),
    reorg_lookback: 12,
    deposit_channel_capacity: 16,
  }
}
