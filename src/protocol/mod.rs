//! Protocol module for decoding band notifications.
//!
//! The band exposes a single data format: the fixed 10-byte accelerometer
//! frame defined in [`frame`].

pub mod frame;

pub use frame::{ticks_to_millis, DecodeError, SensorFrame, FRAME_SIZE, TICKS_PER_SECOND};
