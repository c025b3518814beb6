//! Transport boundary between the session state machine and a BLE stack.
//!
//! A [`GattTransport`] executes commands; their outcomes come back
//! asynchronously as [`LinkEvent`]s on the channel the transport was built
//! with, in the order the stack produced them.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;

/// A GATT characteristic as reported by service discovery.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GattCharacteristic {
    /// Characteristic UUID.
    pub uuid: Uuid,
    /// UUID of the owning service.
    pub service_uuid: Uuid,
    /// Whether the characteristic advertises the notify property.
    pub notify: bool,
}

/// A GATT service and its characteristics.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GattService {
    /// Service UUID.
    pub uuid: Uuid,
    /// Characteristics of this service.
    pub characteristics: Vec<GattCharacteristic>,
}

/// Events the transport delivers, one at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// The link to the band is established.
    Connected,
    /// The link is gone, either requested or lost.
    Disconnected,
    /// Service discovery finished.
    ServicesDiscovered(Vec<GattService>),
    /// The notification-enable descriptor write completed.
    DescriptorWritten {
        /// Characteristic whose descriptor was written.
        characteristic: Uuid,
        /// Whether the write succeeded.
        success: bool,
    },
    /// A characteristic value changed (notification).
    CharacteristicChanged {
        /// Characteristic that changed.
        characteristic: Uuid,
        /// The new value.
        value: Vec<u8>,
    },
}

/// BLE operations the session drives.
#[async_trait]
pub trait GattTransport: Send + Sync {
    /// Start link establishment. Emits [`LinkEvent::Connected`] on success.
    ///
    /// With `auto_reconnect` the transport may retry on its own.
    async fn connect(&self, auto_reconnect: bool) -> Result<()>;

    /// Start service discovery. Emits [`LinkEvent::ServicesDiscovered`].
    async fn discover_services(&self) -> Result<()>;

    /// Write the client configuration descriptor enabling notifications.
    /// Emits [`LinkEvent::DescriptorWritten`].
    async fn enable_notifications(&self, characteristic: &GattCharacteristic) -> Result<()>;

    /// Tear the link down. Emits [`LinkEvent::Disconnected`].
    async fn disconnect(&self) -> Result<()>;

    /// Platform identifier of the peripheral.
    fn identifier(&self) -> String;
}
