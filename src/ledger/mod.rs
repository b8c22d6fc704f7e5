pub mod keys;
pub mod utxo_ledger;

pub use keys::{KeyLayout, CONFIRM_HEIGHT_KEY};
pub use utxo_ledger::UtxoLedger;
