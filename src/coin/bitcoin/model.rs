/**
* filename : model
* description: Chain snapshots, JSON-RPC envelopes and the federation UTXO record.
**/

use bitcoin::{Block, BlockHash, Transaction};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

/// A block as seen by the watcher, tagged confirmed or tip by the stream it
/// arrives on.
#[derive(Debug, Clone)]
pub struct BlockData {
  pub height: u64,
  pub hash: BlockHash,
  /// `current height - height + 1` at the time the block was fetched.
  pub confirmations: u64,
  pub block: Block,
}

impl BlockData {
  pub fn new(height: u64, block: Block) -> Self {
    Self {
      height,
      hash: block.block_hash(),
      confirmations: 0,
      block,
    }
  }

  pub fn transactions(&self) -> &[Transaction] {
    &self.block.txdata
  }
}

// ====== JSON-RPC envelopes ======

#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
  pub jsonrpc: &'static str,
  pub id: &'static str,
  pub method: &'a str,
  pub params: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct RpcResponse<T> {
  pub result: Option<T>,
  pub error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
pub struct RpcErrorObject {
  pub code: i64,
  pub message: String,
}

// ====== Federation UTXO ======

/// Claim state of a federation output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum SpendType {
  Removed = -1,
  Pending = 0,
  Confirmed = 1,
  Spending = 2,
  Spent = 3,
}

impl SpendType {
  pub fn is_terminal(self) -> bool {
    self == SpendType::Spent
  }
}

impl From<SpendType> for i8 {
  fn from(value: SpendType) -> Self {
    value as i8
  }
}

impl TryFrom<i8> for SpendType {
  type Error = String;

  fn try_from(value: i8) -> Result<Self, Self::Error> {
    match value {
      -1 => Ok(SpendType::Removed),
      0 => Ok(SpendType::Pending),
      1 => Ok(SpendType::Confirmed),
      2 => Ok(SpendType::Spending),
      3 => Ok(SpendType::Spent),
      other => Err(format!("unknown spend_type {}", other)),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoInfo {
  pub address: String,
  #[serde(rename = "vout_txid")]
  pub txid: String,
  #[serde(rename = "vout_index")]
  pub vout: u32,
  pub value: u64,
  #[serde(default)]
  pub confirmations: u64,
  pub spend_type: SpendType,
  #[serde(default)]
  pub block_height: u64,
  /// Height of the block that confirmed the spend, used to undo it on reorg.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub spent_height: Option<u64>,
}

impl UtxoInfo {
  pub fn new(address: String, txid: String, vout: u32, value: u64, spend_type: SpendType) -> Self {
    Self {
      address,
      txid,
      vout,
      value,
      confirmations: 0,
      spend_type,
      block_height: 0,
      spent_height: None,
    }
  }

  pub fn utxo_id(&self) -> String {
    utxo_id(&self.txid, self.vout)
  }
}

pub fn utxo_id(txid: &str, vout: u32) -> String {
  format!("{}_{}", txid, vout)
}
