/**
* filename : client
* description: bitcoind-compatible JSON-RPC client (BTC / BCH full nodes).
**/

use crate::coin::bitcoin::model::{BlockData, RpcRequest, RpcResponse};
use crate::coin::coin_trait::ChainQuerySource;
use crate::types::AppError;

use async_trait::async_trait;
use bitcoin::{consensus, Block, BlockHash, Transaction, Txid};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::collections::HashSet;
use std::time::Duration;

#[derive(Clone)]
pub struct BitcoinRpcClient {
  client: Client,
  api_url: String,
  rpc_user: String,
  rpc_password: String,
  coin_type: String,
}

impl BitcoinRpcClient {
  pub fn new(coin_type: &str, api_url: String, rpc_user: String, rpc_password: String) -> Result<Self, AppError> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .map_err(|e| AppError::Initialization(format!("Failed to build RPC client: {}", e)))?;

    Ok(Self {
      client,
      api_url,
      rpc_user,
      rpc_password,
      coin_type: coin_type.to_uppercase(),
    })
  }

  async fn call<T>(&self, method: &str, params: serde_json::Value) -> Result<T, AppError>
  where
    T: DeserializeOwned,
  {
    let request = RpcRequest {
      jsonrpc: "1.0",
      id: "mortgage-watcher",
      method,
      params,
    };

    let mut builder = self.client.post(&self.api_url).json(&request);
    if !self.rpc_user.is_empty() {
      builder = builder.basic_auth(&self.rpc_user, Some(&self.rpc_password));
    }

    // bitcoind answers RPC errors with a non-2xx status and a JSON body, so the
    // body is parsed regardless of status.
    let response = builder.send().await?.json::<RpcResponse<T>>().await?;

    if let Some(err) = response.error {
      return Err(AppError::Rpc {
        code: err.code,
        message: format!("{}: {}", method, err.message),
      });
    }
    response
      .result
      .ok_or_else(|| AppError::Client(format!("{}: empty result", method)))
  }

  pub async fn get_block_hash(&self, height: u64) -> Result<BlockHash, AppError> {
    let hash: String = self.call("getblockhash", json!([height])).await?;
    hash.parse::<BlockHash>()
      .map_err(|e| AppError::Decode(format!("bad block hash '{}': {}", hash, e)))
  }

  pub async fn get_block(&self, hash: &BlockHash) -> Result<Block, AppError> {
    let raw: String = self.call("getblock", json!([hash.to_string(), 0])).await?;
    let bytes = hex::decode(raw.trim())?;
    Ok(consensus::deserialize::<Block>(&bytes)?)
  }
}

#[async_trait]
impl ChainQuerySource for BitcoinRpcClient {
  async fn current_height(&self) -> Result<u64, AppError> {
    self.call("getblockcount", json!([])).await
  }

  async fn block_at_height(&self, height: u64) -> Result<BlockData, AppError> {
    let hash = self.get_block_hash(height).await?;
    let block = self.get_block(&hash).await?;
    Ok(BlockData::new(height, block))
  }

  async fn block_hash(&self, height: u64) -> Result<BlockHash, AppError> {
    self.get_block_hash(height).await
  }

  async fn mempool_txids(&self) -> Result<HashSet<Txid>, AppError> {
    let ids: Vec<String> = self.call("getrawmempool", json!([])).await?;
    let mut txids = HashSet::with_capacity(ids.len());
    for id in ids {
      match id.parse::<Txid>() {
        Ok(txid) => {
          txids.insert(txid);
        }
        Err(e) => log::warn!("[{} RPC] skipping malformed mempool txid {}: {}", self.coin_type, id, e),
      }
    }
    Ok(txids)
  }

  async fn transaction_by_id(&self, txid: &Txid) -> Result<Transaction, AppError> {
    let raw: String = self.call("getrawtransaction", json!([txid.to_string(), false])).await?;
    let bytes = hex::decode(raw.trim())?;
    Ok(consensus::deserialize::<Transaction>(&bytes)?)
  }

  fn chain_name(&self) -> &str {
    &self.coin_type
  }
}
