//! Error types for the sensorband-ble crate.

use thiserror::Error;

/// The main error type for this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Bluetooth-related error from the underlying BLE library.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// No default Bluetooth adapter is available on this host.
    #[error("Bluetooth not available or disabled")]
    BluetoothUnavailable,

    /// The requested band was not found during the scan window.
    #[error("Band not found: {name}")]
    BandNotFound {
        /// The advertised-name pattern that was searched for.
        name: String,
    },

    /// Operation requires a connection but the band is not connected.
    #[error("Band not connected")]
    NotConnected,

    /// Failed to establish a connection to the band.
    #[error("Connection failed: {reason}")]
    ConnectionFailed {
        /// Description of why the connection failed.
        reason: String,
    },

    /// Characteristic not found on the device.
    #[error("Characteristic not found: {uuid}")]
    CharacteristicNotFound {
        /// The UUID of the characteristic that was not found.
        uuid: String,
    },

    /// Service not found on the device.
    #[error("Service not found: {uuid}")]
    ServiceNotFound {
        /// The UUID of the service that was not found.
        uuid: String,
    },

    /// Local storage failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The session log has already been closed.
    #[error("Session log is closed")]
    LogClosed,

    /// Local storage is not mounted or not writable.
    #[error("Storage unavailable: {path}")]
    StorageUnavailable {
        /// The directory that was checked.
        path: String,
    },

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport failure talking to the ingestion endpoint.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The ingestion endpoint refused a record.
    #[error("Remote rejected record ({status}): {message}")]
    RemoteRejected {
        /// HTTP status code returned by the endpoint.
        status: u16,
        /// Response body, if any.
        message: String,
    },

    /// Credential material could not be resolved.
    #[error("Credentials missing: {0}")]
    CredentialsMissing(String),

    /// Configuration is invalid or could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
