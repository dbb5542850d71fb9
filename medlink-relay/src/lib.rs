//! Rendezvous server that stores and forwards signaling messages between
//! peers that cannot reach each other directly yet.

mod registry;
mod signaling;

pub use registry::*;
pub use signaling::*;
