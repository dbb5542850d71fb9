pub mod test_relay;

pub use test_relay::*;
