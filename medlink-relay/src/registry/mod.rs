mod peer_record;
mod signal_store;
mod store_error;

pub use peer_record::*;
pub use signal_store::*;
pub use store_error::*;
