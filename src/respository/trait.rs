use crate::types::AppError;
use async_trait::async_trait;

/// Ordered byte-key store shared by the ledger, the hash-mapping writer and
/// the scan cursor. Every component goes through this one handle.
#[async_trait]
pub trait LedgerStore: Send + Sync {
  async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, AppError>;

  async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), AppError>;

  /// All entries whose key starts with `prefix`, in key order.
  async fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, AppError>;
}
