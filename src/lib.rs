/**
* filename : lib
* description: Federation-address deposit watcher for bitcoind-compatible UTXO chains.
**/

pub mod analyzer;
pub mod coin;
pub mod config;
pub mod fetcher;
pub mod ledger;
pub mod respository;
pub mod shutdown;
pub mod tasks;
pub mod types;
