use crate::analyzer::types::SubTransaction;
use crate::coin::bitcoin::model::BlockData;
use bitcoin::Transaction;
use tokio::sync::mpsc::{Receiver, Sender};

// ====== Channel aliases ======
pub type BlockSender = Sender<BlockData>;
pub type BlockReceiver = Receiver<BlockData>;
pub type TxSender = Sender<Transaction>;
pub type TxReceiver = Receiver<Transaction>;
pub type DepositSender = Sender<SubTransaction>;
pub type DepositReceiver = Receiver<SubTransaction>;

// ====== Unified Error Type ======
#[derive(Debug, thiserror::Error)]
pub enum AppError {
  #[error("API Client error: {0}")]
  Client(String),

  #[error("RPC error {code}: {message}")]
  Rpc { code: i64, message: String },

  #[error("Decode error: {0}")]
  Decode(String),

  #[error("Channel send error: {0}")]
  SendError(String),

  #[error("Task join error: {0}")]
  JoinError(#[from] tokio::task::JoinError),

  #[error("Configuration error: {0}")]
  Config(String),

  #[error("Initialization error: {0}")]
  Initialization(String),

  #[error("Database error: {0}")]
  Database(String),
}

impl AppError {
  /// Transport and storage failures are retried on the next poll cycle.
  /// Malformed data is not: retrying would decode the same bytes again.
  pub fn is_transient(&self) -> bool {
    !matches!(self, AppError::Decode(_) | AppError::Config(_))
  }
}

// ====== Error Conversions (From impls) ======

impl From<reqwest::Error> for AppError {
  fn from(err: reqwest::Error) -> Self {
    AppError::Client(format!("Reqwest error: {}", err))
  }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for AppError {
  fn from(err: tokio::sync::mpsc::error::SendError<T>) -> Self {
    AppError::SendError(format!("Channel send failed: {}", err))
  }
}

impl From<std::io::Error> for AppError {
  fn from(err: std::io::Error) -> Self {
    AppError::Initialization(format!("IO error: {}", err))
  }
}

impl From<serde_json::Error> for AppError {
  fn from(err: serde_json::Error) -> Self {
    AppError::Decode(format!("JSON parse error: {}", err))
  }
}

impl From<hex::FromHexError> for AppError {
  fn from(err: hex::FromHexError) -> Self {
    AppError::Decode(format!("Hex decode error: {}", err))
  }
}

impl From<bitcoin::consensus::encode::Error> for AppError {
  fn from(err: bitcoin::consensus::encode::Error) -> Self {
    AppError::Decode(format!("Consensus decode error: {}", err))
  }
}

impl From<config::ConfigError> for AppError {
  fn from(err: config::ConfigError) -> Self {
    AppError::Config(err.to_string())
  }
}
