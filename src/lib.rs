// Allow unusual byte groupings for UUIDs which have standard format
#![allow(clippy::unusual_byte_groupings)]

//! # sensorband-ble
//!
//! A cross-platform Rust library for recording accelerometer data from
//! wearable sensor bands over Bluetooth Low Energy.
//!
//! The band advertises as `BP<id>` and pushes fixed 10-byte frames on a
//! notify characteristic. Each frame is decoded, rebased onto a
//! session-relative clock, deduplicated, and then written to a per-session
//! log file and (optionally) forwarded to a remote record stream.
//!
//! ## Features
//!
//! - **Discovery**: Time-bounded scan for a band by advertised name
//! - **Negotiation**: Connect, discover services, enable notifications
//! - **Sequencing**: Zero-based, strictly increasing sample timestamps
//! - **Local Logging**: One CSV-style file per session
//! - **Remote Streaming**: Best-effort forwarding, partitioned by device
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sensorband_ble::{BandRecorder, BandScanner, ChannelStatusReporter, Config, FsStorage, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load_default()?;
//!     let (reporter, _updates) = ChannelStatusReporter::new();
//!
//!     let recorder = BandRecorder::new(
//!         BandScanner::new().await?,
//!         config.session_settings(),
//!         Arc::new(FsStorage::new(&config.log_dir)),
//!         Arc::new(reporter),
//!     );
//!
//!     if let Some(band) = recorder.find_band().await? {
//!         let session = recorder.start_session(band);
//!         let stats = session.wait().await?;
//!         println!("Recorded {} samples", stats.accepted);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Platform Notes
//!
//! ### macOS
//! Requires Bluetooth permission. Add `NSBluetoothAlwaysUsageDescription`
//! to your Info.plist for bundled apps.
//!
//! ### Linux
//! Requires BlueZ. User may need to be in the `bluetooth` group.
//!
//! ### Windows
//! Requires Windows 10 or later with Bluetooth LE support.

// Public modules
pub mod ble;
pub mod config;
pub mod data;
pub mod error;
pub mod protocol;
pub mod recorder;
pub mod session;
pub mod sink;
pub mod status;

// Re-exports for convenience
pub use config::{Config, RemoteConfig};
pub use error::{Error, Result};
pub use recorder::{run_session, spawn_session, BandRecorder, Control, SessionHandle};
pub use session::{ConnectionSession, FrameOutcome, SessionCommand, SessionSettings};
pub use status::{ButtonState, ChannelStatusReporter, StatusReporter, StatusUpdate};

// Re-export commonly used types from submodules
pub use ble::connection::ConnectionState;
pub use ble::scanner::{BandScanner, DiscoveredBand, ScanOutcome};
pub use ble::transport::{GattCharacteristic, GattService, GattTransport, LinkEvent};
pub use data::{Rejected, Sample, SampleSequencer, SessionStats};
pub use protocol::{DecodeError, SensorFrame};
pub use sink::{
    Credentials, CredentialsProvider, DropReason, EnvCredentials, FsStorage, HttpIngestClient,
    IngestClient, LocalLogSink, RemoteStreamSink, SendOutcome, StaticCredentials, StorageProvider,
};
