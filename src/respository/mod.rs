#[cfg(feature = "rocksdb-backend")]
mod rocksdb;
mod r#trait;
mod memory;
mod wrapper;

// Store trait
pub use r#trait::LedgerStore;

// Store implementations
pub use memory::MemoryStore;
#[cfg(feature = "rocksdb-backend")]
pub use self::rocksdb::{open_rocksdb, RocksDbStore};
pub use wrapper::StoreWrapper;
