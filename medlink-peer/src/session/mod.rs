mod candidate_queue;
mod driver;
mod session;
mod shared;
mod state;

pub use session::Session;
pub use state::{ChannelState, EndReason, Role, SessionStatus, SessionTarget};
