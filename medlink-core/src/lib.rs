pub mod model;

pub use model::*;

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the unix epoch, the timestamp unit used on the wire.
pub fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
