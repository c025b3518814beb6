//! BLE scanning functionality.
//!
//! Provides a time-bounded scanner that looks for a single band by its
//! advertised name.

use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::future::FutureExt;
use futures::stream::{Stream, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};

/// Default scan window.
pub const DEFAULT_SCAN_WINDOW: Duration = Duration::from_secs(10);

/// A band found by the scanner.
#[derive(Debug, Clone)]
pub struct DiscoveredBand {
    /// The BLE peripheral identifier.
    pub identifier: String,
    /// Advertised local name.
    pub name: String,
    /// The peripheral handle.
    pub peripheral: Peripheral,
    /// Adapter the band was found on.
    pub adapter: Adapter,
    /// Signal strength in dBm.
    pub rssi: Option<i16>,
}

/// Check whether an advertised name matches `pattern`.
///
/// Peripherals without a name never match. The pattern may appear anywhere
/// in the name.
pub fn name_matches(name: Option<&str>, pattern: &str) -> bool {
    match name {
        Some(name) => !pattern.is_empty() && name.contains(pattern),
        None => false,
    }
}

/// Outcome of a call to [`BandScanner::scan`].
#[derive(Debug)]
pub enum ScanOutcome {
    /// A matching band was found; the scan has stopped.
    Found(DiscoveredBand),
    /// The window elapsed without a match.
    TimedOut,
    /// The scan was stopped before the window elapsed, or a scan was
    /// already running and this call stopped it.
    Stopped,
}

/// How one scan window ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum WindowOutcome<T> {
    /// First advertisement whose name matched, with that name.
    Matched(T, String),
    TimedOut,
    Stopped,
}

/// Start/stop bookkeeping shared by a scan window and whoever stops it.
#[derive(Debug, Default)]
pub(crate) struct ScanGate {
    active: AtomicBool,
    stop: Notify,
}

impl ScanGate {
    /// Open a scan window.
    ///
    /// If one is already open it is asked to stop instead and `false` is
    /// returned.
    pub(crate) fn begin(&self) -> bool {
        if self.active.swap(true, Ordering::AcqRel) {
            self.stop.notify_one();
            return false;
        }

        // Discard a stop aimed at a window that has already ended.
        let _ = self.stop.notified().now_or_never();
        true
    }

    /// Close the window opened by [`ScanGate::begin`].
    pub(crate) fn end(&self) {
        self.active.store(false, Ordering::Release);
    }

    /// Ask the open window to stop. Returns false if none is open.
    pub(crate) fn request_stop(&self) -> bool {
        if !self.active.load(Ordering::Acquire) {
            return false;
        }
        self.stop.notify_one();
        true
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Watch advertisements `(item, name)` until one matches `pattern`, the
    /// window elapses or a stop is requested. The first match wins.
    pub(crate) async fn watch<S, T>(
        &self,
        adverts: S,
        pattern: &str,
        window: Duration,
    ) -> WindowOutcome<T>
    where
        S: Stream<Item = (T, Option<String>)>,
    {
        futures::pin_mut!(adverts);
        let deadline = tokio::time::sleep(window);
        tokio::pin!(deadline);
        let mut open = true;

        loop {
            tokio::select! {
                biased;

                _ = self.stop.notified() => {
                    debug!("Scan stopped");
                    return WindowOutcome::Stopped;
                }
                _ = &mut deadline => {
                    debug!("Scan window elapsed");
                    return WindowOutcome::TimedOut;
                }
                advert = adverts.next(), if open => match advert {
                    Some((item, name)) => {
                        if name_matches(name.as_deref(), pattern) {
                            if let Some(name) = name {
                                return WindowOutcome::Matched(item, name);
                            }
                        }
                    }
                    None => open = false,
                },
            }
        }
    }
}

/// BLE scanner for finding a sensor band.
pub struct BandScanner {
    /// The BLE adapter to use for scanning.
    adapter: Adapter,
    /// Whether scanning is currently active.
    gate: ScanGate,
}

impl BandScanner {
    /// Create a scanner on the host's default adapter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BluetoothUnavailable`] if there is no adapter.
    pub async fn new() -> Result<Self> {
        let manager = Manager::new()
            .await
            .map_err(|_e| Error::BluetoothUnavailable)?;

        let adapters = manager.adapters().await.map_err(Error::Bluetooth)?;

        let adapter = adapters
            .into_iter()
            .next()
            .ok_or(Error::BluetoothUnavailable)?;

        info!(
            "Using Bluetooth adapter: {:?}",
            adapter.adapter_info().await.ok()
        );

        Ok(Self::with_adapter(adapter))
    }

    /// Create a scanner with a specific adapter.
    pub fn with_adapter(adapter: Adapter) -> Self {
        Self {
            adapter,
            gate: ScanGate::default(),
        }
    }

    /// Scan for a band whose advertised name contains `pattern`.
    ///
    /// The scan is cancelled after `window` whatever the outcome. If a scan
    /// is already running it is stopped and [`ScanOutcome::Stopped`] is
    /// returned.
    pub async fn scan(&self, pattern: &str, window: Duration) -> Result<ScanOutcome> {
        if !self.gate.begin() {
            debug!("Scan already active, stopping it");
            return Ok(ScanOutcome::Stopped);
        }

        let result = self.scan_window(pattern, window).await;
        self.gate.end();

        if let Err(e) = self.adapter.stop_scan().await {
            warn!("Failed to stop scan: {}", e);
        }

        result
    }

    async fn scan_window(&self, pattern: &str, window: Duration) -> Result<ScanOutcome> {
        let events = self.adapter.events().await?;

        info!("Scanning for '{}' ({:?})", pattern, window);
        self.adapter.start_scan(ScanFilter::default()).await?;

        let adapter = self.adapter.clone();
        let adverts = events.filter_map(move |event| {
            let adapter = adapter.clone();
            async move {
                match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                        lookup(&adapter, id).await
                    }
                    _ => None,
                }
            }
        });

        match self.gate.watch(adverts, pattern, window).await {
            WindowOutcome::Matched((id, peripheral, rssi), name) => {
                info!("Found {} ({})", name, id);
                Ok(ScanOutcome::Found(DiscoveredBand {
                    identifier: id.to_string(),
                    name,
                    peripheral,
                    adapter: self.adapter.clone(),
                    rssi,
                }))
            }
            WindowOutcome::TimedOut => Ok(ScanOutcome::TimedOut),
            WindowOutcome::Stopped => Ok(ScanOutcome::Stopped),
        }
    }

    /// Stop scanning.
    pub async fn stop_scanning(&self) -> Result<()> {
        if !self.gate.request_stop() {
            debug!("Not scanning, ignoring stop request");
            return Ok(());
        }

        info!("Stopping BLE scan");
        Ok(())
    }

    /// Check if currently scanning.
    pub fn is_scanning(&self) -> bool {
        self.gate.is_active()
    }

    /// Get the underlying adapter.
    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }
}

/// Resolve a peripheral and its advertised name.
async fn lookup(
    adapter: &Adapter,
    id: PeripheralId,
) -> Option<((PeripheralId, Peripheral, Option<i16>), Option<String>)> {
    let peripheral = match adapter.peripheral(&id).await {
        Ok(p) => p,
        Err(e) => {
            trace!("Failed to get peripheral: {}", e);
            return None;
        }
    };

    let properties = match peripheral.properties().await {
        Ok(Some(p)) => p,
        _ => return None,
    };

    Some(((id, peripheral, properties.rssi), properties.local_name))
}

impl Drop for BandScanner {
    fn drop(&mut self) {
        self.gate.request_stop();
    }
}
