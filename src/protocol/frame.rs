//! Sensor frame decoding.
//!
//! The band pushes one 10-byte frame per accelerometer reading on the
//! acceleration characteristic. All fields are little-endian:
//!
//! | Offset | Width | Field                                   |
//! |--------|-------|-----------------------------------------|
//! | 0-1    | 2     | X axis (i16)                            |
//! | 2-3    | 2     | Y axis (i16)                            |
//! | 4-5    | 2     | Z axis (i16)                            |
//! | 6-9    | 4     | Device tick counter (u32, 1024 ticks/s) |

use thiserror::Error;

/// Size of a sensor frame in bytes.
pub const FRAME_SIZE: usize = 10;

/// Tick rate of the band's free-running clock.
pub const TICKS_PER_SECOND: u64 = 1024;

/// Errors produced while decoding a frame.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The notification payload was not exactly [`FRAME_SIZE`] bytes.
    #[error("Wrong frame length: {len} bytes (expected {FRAME_SIZE})")]
    WrongLength {
        /// The length that was received.
        len: usize,
    },
}

/// A decoded sensor frame, before sequencing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SensorFrame {
    /// X axis, raw sensor units.
    pub x: i16,
    /// Y axis, raw sensor units.
    pub y: i16,
    /// Z axis, raw sensor units.
    pub z: i16,
    /// Raw device tick counter.
    pub ticks: u32,
}

impl SensorFrame {
    /// Decode a frame from notification data.
    ///
    /// Any length other than [`FRAME_SIZE`] is rejected with
    /// [`DecodeError::WrongLength`].
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let bytes: &[u8; FRAME_SIZE] = data
            .try_into()
            .map_err(|_| DecodeError::WrongLength { len: data.len() })?;

        Ok(Self {
            x: i16::from_le_bytes([bytes[0], bytes[1]]),
            y: i16::from_le_bytes([bytes[2], bytes[3]]),
            z: i16::from_le_bytes([bytes[4], bytes[5]]),
            ticks: u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]),
        })
    }

    /// Encode the frame using the wire layout.
    pub fn encode(&self) -> [u8; FRAME_SIZE] {
        let mut out = [0u8; FRAME_SIZE];
        out[0..2].copy_from_slice(&self.x.to_le_bytes());
        out[2..4].copy_from_slice(&self.y.to_le_bytes());
        out[4..6].copy_from_slice(&self.z.to_le_bytes());
        out[6..10].copy_from_slice(&self.ticks.to_le_bytes());
        out
    }

    /// Device timestamp of this frame in milliseconds.
    pub fn device_timestamp_ms(&self) -> u32 {
        ticks_to_millis(self.ticks)
    }
}

/// Convert device ticks to milliseconds, truncating.
///
/// The multiplication is done in 64 bits; the result always fits in a `u32`
/// because `u32::MAX * 1000 / 1024 < u32::MAX`.
#[inline]
pub fn ticks_to_millis(ticks: u32) -> u32 {
    (ticks as u64 * 1000 / TICKS_PER_SECOND) as u32
}
