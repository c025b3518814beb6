//! btleplug-backed transport.
//!
//! Wraps a discovered peripheral and turns btleplug's async calls and
//! notification streams into [`LinkEvent`]s.

use async_trait::async_trait;
use btleplug::api::{Central, CentralEvent, CharPropFlags, Characteristic, Peripheral as _};
use btleplug::platform::{Adapter, Peripheral};
use futures::stream::StreamExt;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::ble::transport::{GattCharacteristic, GattService, GattTransport, LinkEvent};
use crate::error::{Error, Result};

/// Transport for one peripheral.
pub struct BtleTransport {
    /// The peripheral to manage.
    peripheral: Peripheral,
    /// Adapter that discovered the peripheral; watched for disconnects.
    adapter: Adapter,
    /// Channel for link events.
    event_tx: mpsc::UnboundedSender<LinkEvent>,
    /// Notification forwarder and disconnect watcher.
    tasks: Mutex<Vec<JoinHandle<()>>>,
    /// Connection attempts when auto-reconnect is requested.
    max_connect_attempts: u32,
    /// Delay between connection attempts.
    retry_delay: Duration,
}

impl BtleTransport {
    /// Create a transport for `peripheral`, delivering events on `event_tx`.
    pub fn new(
        peripheral: Peripheral,
        adapter: Adapter,
        event_tx: mpsc::UnboundedSender<LinkEvent>,
    ) -> Self {
        Self {
            peripheral,
            adapter,
            event_tx,
            tasks: Mutex::new(Vec::new()),
            max_connect_attempts: 3,
            retry_delay: Duration::from_secs(1),
        }
    }

    /// Set how often, and how far apart, connecting is retried when
    /// auto-reconnect is requested.
    pub fn with_connect_retry(mut self, max_attempts: u32, delay: Duration) -> Self {
        self.max_connect_attempts = max_attempts.max(1);
        self.retry_delay = delay;
        self
    }

    /// Get the peripheral.
    pub fn peripheral(&self) -> &Peripheral {
        &self.peripheral
    }

    fn emit(&self, event: LinkEvent) {
        if self.event_tx.send(event).is_err() {
            trace!("Link event receiver dropped");
        }
    }

    /// Forward notifications and watch for the link dropping.
    async fn start_listeners(&self) -> Result<()> {
        let mut notifications = self.peripheral.notifications().await?;
        let tx = self.event_tx.clone();

        let notification_task = tokio::spawn(async move {
            debug!("Notification listener started");
            while let Some(notification) = notifications.next().await {
                trace!(
                    "Notification from {}: {:02X?}",
                    notification.uuid,
                    notification.value
                );
                let event = LinkEvent::CharacteristicChanged {
                    characteristic: notification.uuid,
                    value: notification.value,
                };
                if tx.send(event).is_err() {
                    break;
                }
            }
            debug!("Notification listener stopped");
        });

        let mut central_events = self.adapter.events().await?;
        let peripheral_id = self.peripheral.id();
        let tx = self.event_tx.clone();

        let watcher_task = tokio::spawn(async move {
            while let Some(event) = central_events.next().await {
                if let CentralEvent::DeviceDisconnected(id) = event {
                    if id == peripheral_id {
                        info!("Link to {:?} lost", id);
                        let _ = tx.send(LinkEvent::Disconnected);
                        break;
                    }
                }
            }
        });

        let mut tasks = self.tasks.lock();
        tasks.push(notification_task);
        tasks.push(watcher_task);

        Ok(())
    }

    fn stop_listeners(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }

    fn find_characteristic(&self, uuid: &uuid::Uuid) -> Result<Characteristic> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == *uuid)
            .ok_or_else(|| Error::CharacteristicNotFound {
                uuid: uuid.to_string(),
            })
    }
}

/// Convert btleplug's service tree into transport-neutral types.
fn to_gatt_services(peripheral: &Peripheral) -> Vec<GattService> {
    peripheral
        .services()
        .into_iter()
        .map(|service| GattService {
            uuid: service.uuid,
            characteristics: service
                .characteristics
                .into_iter()
                .map(|c| GattCharacteristic {
                    uuid: c.uuid,
                    service_uuid: c.service_uuid,
                    notify: c.properties.contains(CharPropFlags::NOTIFY),
                })
                .collect(),
        })
        .collect()
}

#[async_trait]
impl GattTransport for BtleTransport {
    async fn connect(&self, auto_reconnect: bool) -> Result<()> {
        if self.peripheral.is_connected().await.unwrap_or(false) {
            info!("Peripheral already connected at BLE level");
        } else {
            let max_attempts = if auto_reconnect {
                self.max_connect_attempts
            } else {
                1
            };
            let mut attempts = 0;

            loop {
                attempts += 1;
                debug!("Connection attempt {} of {}", attempts, max_attempts);

                match self.peripheral.connect().await {
                    Ok(()) => break,
                    Err(e) if attempts < max_attempts => {
                        warn!("Connection attempt {} failed: {}", attempts, e);
                        tokio::time::sleep(self.retry_delay).await;
                    }
                    Err(e) => {
                        error!("Connection failed after {} attempts: {}", attempts, e);
                        return Err(Error::ConnectionFailed {
                            reason: format!("Failed after {} attempts: {}", attempts, e),
                        });
                    }
                }
            }
        }

        self.start_listeners().await?;
        self.emit(LinkEvent::Connected);
        Ok(())
    }

    async fn discover_services(&self) -> Result<()> {
        if !self.peripheral.is_connected().await? {
            return Err(Error::NotConnected);
        }

        self.peripheral.discover_services().await?;

        let services = to_gatt_services(&self.peripheral);
        debug!("Discovered {} services", services.len());

        self.emit(LinkEvent::ServicesDiscovered(services));
        Ok(())
    }

    async fn enable_notifications(&self, characteristic: &GattCharacteristic) -> Result<()> {
        let services = self.peripheral.services();
        if !services.iter().any(|s| s.uuid == characteristic.service_uuid) {
            return Err(Error::ServiceNotFound {
                uuid: characteristic.service_uuid.to_string(),
            });
        }

        let target = self.find_characteristic(&characteristic.uuid)?;

        // btleplug writes the client configuration descriptor itself.
        let result = self.peripheral.subscribe(&target).await;

        self.emit(LinkEvent::DescriptorWritten {
            characteristic: characteristic.uuid,
            success: result.is_ok(),
        });

        result.map_err(Error::Bluetooth)
    }

    async fn disconnect(&self) -> Result<()> {
        let result = self.peripheral.disconnect().await;
        self.stop_listeners();
        self.emit(LinkEvent::Disconnected);

        match result {
            Ok(()) => {
                info!("Successfully disconnected from band");
                Ok(())
            }
            Err(e) => {
                error!("Failed to disconnect: {}", e);
                Err(Error::Bluetooth(e))
            }
        }
    }

    fn identifier(&self) -> String {
        self.peripheral.id().to_string()
    }
}

impl Drop for BtleTransport {
    fn drop(&mut self) {
        self.stop_listeners();
    }
}
