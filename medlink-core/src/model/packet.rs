use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            heading: None,
            speed: None,
        }
    }
}

/// Application payloads the driver and rider apps exchange over the data channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Packet {
    LocationUpdate { data: Location, timestamp: i64 },
    BookingUpdate { data: serde_json::Value, timestamp: i64 },
}

impl Packet {
    pub fn location(location: Location) -> Self {
        Packet::LocationUpdate {
            data: location,
            timestamp: crate::unix_millis(),
        }
    }

    pub fn booking(data: serde_json::Value) -> Self {
        Packet::BookingUpdate {
            data,
            timestamp: crate::unix_millis(),
        }
    }
}
