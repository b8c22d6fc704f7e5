/// Fixed key of the persisted scan cursor.
pub const CONFIRM_HEIGHT_KEY: &str = "confirmHeight";

/// Namespaced keys for one coin: `{coin}_utxo_{txid}_{index}`,
/// `{coin}_fa_tx_{hash}`, `{coin}_hash_mapping_{presign}`, `{coin}_mortgage_{txid}`.
#[derive(Debug, Clone)]
pub struct KeyLayout {
  utxo_prefix: String,
  tx_prefix: String,
  mapping_prefix: String,
  mortgage_prefix: String,
}

impl KeyLayout {
  pub fn new(coin_type: &str) -> Self {
    let coin = coin_type.to_lowercase();
    Self {
      utxo_prefix: [coin.as_str(), "utxo"].join("_"),
      tx_prefix: [coin.as_str(), "fa_tx"].join("_"),
      mapping_prefix: [coin.as_str(), "hash_mapping"].join("_"),
      mortgage_prefix: [coin.as_str(), "mortgage"].join("_"),
    }
  }

  pub fn utxo_scan_prefix(&self) -> String {
    format!("{}_", self.utxo_prefix)
  }

  pub fn utxo_key(&self, utxo_id: &str) -> String {
    format!("{}_{}", self.utxo_prefix, utxo_id)
  }

  pub fn utxo_id_from_key<'a>(&self, key: &'a str) -> Option<&'a str> {
    key.strip_prefix(&self.utxo_scan_prefix())
  }

  pub fn fa_tx_key(&self, hash: &str) -> String {
    format!("{}_{}", self.tx_prefix, hash)
  }

  pub fn hash_mapping_key(&self, hash_before_sign: &str) -> String {
    format!("{}_{}", self.mapping_prefix, hash_before_sign)
  }

  pub fn mortgage_key(&self, txid: &str) -> String {
    format!("{}_{}", self.mortgage_prefix, txid)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn keys_are_namespaced_by_coin() {
    let keys = KeyLayout::new("BTC");
    assert_eq!(keys.utxo_key("ab_1"), "btc_utxo_ab_1");
    assert_eq!(keys.fa_tx_key("ff"), "btc_fa_tx_ff");
    assert_eq!(keys.hash_mapping_key("ee"), "btc_hash_mapping_ee");
    assert_eq!(keys.utxo_id_from_key("btc_utxo_ab_1"), Some("ab_1"));
    assert_eq!(keys.utxo_id_from_key("bch_utxo_ab_1"), None);
  }
}
