pub mod runner;
pub mod fetcher;
pub mod confirmed;
pub mod tip;
pub mod mempool;
pub mod block_watcher;

pub use block_watcher::{BlockWatcher, WatcherStreams};
pub use confirmed::ConfirmedBlockPoller;
pub use fetcher::Poller;
pub use mempool::MempoolPoller;
pub use tip::TipBlockPoller;
