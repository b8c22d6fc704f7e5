/**
* filename : address
* description: Address decoding and output-script address extraction.
**/

use crate::types::AppError;
use bitcoin::address::NetworkUnchecked;
use bitcoin::{Address, Network, Script};
use log::debug;

/// Black-box address capability for the watched coin.
///
/// BCH outputs are rendered in legacy base58 form; CashAddr strings are not
/// understood here.
#[derive(Debug, Clone)]
pub struct AddressCodec {
  coin_type: String,
  network: Network,
}

impl AddressCodec {
  pub fn new(coin_type: &str, network: Network) -> Self {
    Self {
      coin_type: coin_type.to_lowercase(),
      network,
    }
  }

  pub fn network(&self) -> Network {
    self.network
  }

  pub fn decode(&self, address: &str) -> Result<Address, AppError> {
    let unchecked: Address<NetworkUnchecked> = address
      .trim()
      .parse()
      .map_err(|e| AppError::Decode(format!("[{}] bad address '{}': {}", self.coin_type, address, e)))?;
    unchecked
      .require_network(self.network)
      .map_err(|e| AppError::Decode(format!("[{}] address '{}' not valid on {}: {}", self.coin_type, address, self.network, e)))
  }

  /// Address paid by a standard output script, `None` for data-carrier and
  /// non-standard scripts.
  pub fn extract(&self, script: &Script) -> Option<String> {
    if script.is_op_return() {
      return None;
    }
    match Address::from_script(script, self.network) {
      Ok(address) => Some(address.to_string()),
      Err(e) => {
        debug!("[{}] no address for script {}: {}", self.coin_type, hex::encode(script.as_bytes()), e);
        None
      }
    }
  }
}
