use bitcoin::{ScriptBuf, Transaction, Txid};
use serde::{Deserialize, Serialize};

/// Destination address and amount of one mint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressInfo {
  pub address: String,
  pub amount: u64,
}

/// Deposit event handed to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTransaction {
  pub sc_txid: String,
  pub amount: u64,
  pub recharge_list: Vec<AddressInfo>,
  /// Source chain.
  pub from: String,
  /// Destination chain.
  pub to: String,
  pub token_from: u32,
  pub token_to: u32,
}

impl SubTransaction {
  pub fn new(
    sc_txid: String,
    amount: u64,
    from: String,
    to: String,
    token_to: u32,
    destination: String,
  ) -> Self {
    Self {
      sc_txid,
      amount,
      recharge_list: vec![AddressInfo {
        address: destination,
        amount,
      }],
      from,
      to,
      token_from: 0,
      token_to,
    }
  }
}

/// Txid of a federation transaction before and after its inputs were signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashMapping {
  pub hash_before_sign: Txid,
  pub hash_after_sign: Txid,
}

impl HashMapping {
  pub fn from_transaction(tx: &Transaction) -> Self {
    Self {
      hash_before_sign: hash_before_sign(tx),
      hash_after_sign: tx.compute_txid(),
    }
  }
}

/// Txid of `tx` with every signature script cleared.
pub fn hash_before_sign(tx: &Transaction) -> Txid {
  let mut unsigned = tx.clone();
  for input in unsigned.input.iter_mut() {
    input.script_sig = ScriptBuf::new();
  }
  unsigned.compute_txid()
}

#[cfg(test)]
mod tests {
  use super::*;
  use bitcoin::absolute::LockTime;
  use bitcoin::hashes::Hash;
  use bitcoin::transaction::Version;
  use bitcoin::{Amount, OutPoint, Sequence, TxIn, TxOut, Witness};

  fn spend(script_sig: ScriptBuf) -> Transaction {
    Transaction {
      version: Version::TWO,
      lock_time: LockTime::ZERO,
      input: vec![TxIn {
        previous_output: OutPoint::new(Txid::from_byte_array([7u8; 32]), 1),
        script_sig,
        sequence: Sequence::MAX,
        witness: Witness::new(),
      }],
      output: vec![TxOut {
        value: Amount::from_sat(1_000),
        script_pubkey: ScriptBuf::new(),
      }],
    }
  }

  #[test]
  fn presign_hash_ignores_signatures() {
    let unsigned = spend(ScriptBuf::new());
    let signed = spend(ScriptBuf::from_bytes(vec![0x01, 0xaa]));
    let mapping = HashMapping::from_transaction(&signed);
    assert_eq!(mapping.hash_before_sign, unsigned.compute_txid());
    assert_eq!(mapping.hash_after_sign, signed.compute_txid());
    assert_ne!(mapping.hash_before_sign, mapping.hash_after_sign);
  }

  #[test]
  fn recharge_list_carries_full_amount() {
    let tx = SubTransaction::new("ab".into(), 500_000, "btc".into(), "ETH".into(), 7, "0xabc".into());
    assert_eq!(tx.recharge_list, vec![AddressInfo { address: "0xabc".into(), amount: 500_000 }]);
    assert_eq!(tx.token_from, 0);
  }
}
