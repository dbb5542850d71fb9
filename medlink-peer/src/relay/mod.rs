mod http_relay;
mod relay_error;
mod signaling_relay;

pub use http_relay::HttpRelay;
pub use relay_error::RelayError;
pub use signaling_relay::{Registration, SignalingRelay};
