pub mod mortgage_watcher;
pub mod payload;
pub mod types;
pub mod utils;

pub use mortgage_watcher::{load_confirm_height, MortgageWatcher};
pub use payload::{parse_payload_script, Message, PayloadError, PAYLOAD_MAGIC};
pub use types::{hash_before_sign, AddressInfo, HashMapping, SubTransaction};
