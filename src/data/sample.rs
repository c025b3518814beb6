//! Decoded accelerometer samples.

use serde::{Deserialize, Serialize};

/// One sequenced accelerometer reading.
///
/// `timestamp_ms` is relative to the first sample of the session that
/// produced it, not wall-clock time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sample {
    /// Identifier of the band that produced the sample.
    #[serde(rename = "deviceID")]
    pub device_id: String,

    /// X axis, raw sensor units.
    pub x: i16,

    /// Y axis, raw sensor units.
    pub y: i16,

    /// Z axis, raw sensor units.
    pub z: i16,

    /// Milliseconds since the first sample of the session.
    #[serde(rename = "timestamp")]
    pub timestamp_ms: u64,
}

impl Sample {
    /// Create a new sample.
    pub fn new(device_id: impl Into<String>, x: i16, y: i16, z: i16, timestamp_ms: u64) -> Self {
        Self {
            device_id: device_id.into(),
            x,
            y,
            z,
            timestamp_ms,
        }
    }

    /// Format the sample as a local log line, including the trailing newline.
    pub fn to_log_line(&self) -> String {
        format!("{},{},{},{}\n", self.timestamp_ms, self.x, self.y, self.z)
    }

    /// Serialize the sample as the remote interchange record.
    pub fn to_record_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Key used to route this sample at the ingestion layer.
    pub fn partition_key(&self) -> &str {
        &self.device_id
    }
}
