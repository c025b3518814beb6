//! BLE communication module.
//!
//! This module provides the Bluetooth Low Energy pieces needed to find a
//! sensor band, negotiate its notification subscription and receive frames.

pub mod connection;
pub mod peripheral;
pub mod scanner;
pub mod transport;
pub mod uuids;

pub use connection::ConnectionState;
pub use peripheral::BtleTransport;
pub use scanner::{name_matches, BandScanner, DiscoveredBand, ScanOutcome};
pub use transport::{GattCharacteristic, GattService, GattTransport, LinkEvent};
pub use uuids::*;
