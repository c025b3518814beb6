//! Session driver and top-level recorder.
//!
//! The driver task pumps [`LinkEvent`]s from the transport into a
//! [`ConnectionSession`] and executes the commands it returns. It is the
//! only owner of the session, so events are handled strictly one at a time.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::ble::connection::ConnectionState;
use crate::ble::peripheral::BtleTransport;
use crate::ble::scanner::{BandScanner, DiscoveredBand, ScanOutcome, DEFAULT_SCAN_WINDOW};
use crate::ble::transport::{GattTransport, LinkEvent};
use crate::data::SessionStats;
use crate::error::{Error, Result};
use crate::session::{ConnectionSession, SessionCommand, SessionSettings};
use crate::sink::{RemoteStreamSink, StorageProvider};
use crate::status::StatusReporter;

/// Requests from the user side to a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Tear the session down.
    Disconnect,
}

async fn execute<T: GattTransport + ?Sized>(
    session: &mut ConnectionSession,
    transport: &T,
    command: Option<SessionCommand>,
) {
    let Some(command) = command else {
        return;
    };
    debug!("Executing {:?}", command);

    match command {
        SessionCommand::Connect { auto_reconnect } => {
            if let Err(e) = transport.connect(auto_reconnect).await {
                warn!("Failed to connect to {}: {}", transport.identifier(), e);
                session.on_link_lost();
            }
        }
        SessionCommand::DiscoverServices => {
            if let Err(e) = transport.discover_services().await {
                warn!("Service discovery failed: {}", e);
            }
        }
        SessionCommand::EnableNotifications(characteristic) => {
            match transport.enable_notifications(&characteristic).await {
                Ok(()) => session.on_subscription_issued(),
                Err(e) => warn!(
                    "Failed to enable notifications on {}: {}",
                    characteristic.uuid, e
                ),
            }
        }
        SessionCommand::Disconnect => {
            if let Err(e) = transport.disconnect().await {
                warn!("Disconnect failed: {}", e);
            }
        }
    }
}

/// Execute `command`, abandoning it if a disconnect is requested meanwhile.
///
/// A transport call such as connect may never resolve; the user must still
/// be able to tear the session down.
async fn execute_or_disconnect<T: GattTransport + ?Sized>(
    session: &mut ConnectionSession,
    transport: &T,
    command: Option<SessionCommand>,
    control: &mut mpsc::UnboundedReceiver<Control>,
    control_open: &mut bool,
) {
    if command.is_none() {
        return;
    }

    let interrupted = {
        let work = execute(session, transport, command);
        tokio::pin!(work);

        loop {
            tokio::select! {
                biased;

                () = &mut work => break false,
                request = control.recv(), if *control_open => match request {
                    Some(Control::Disconnect) => break true,
                    None => *control_open = false,
                },
            }
        }
    };

    if interrupted {
        debug!("Disconnect requested while a command was pending");
        let command = session.request_disconnect();
        execute(session, transport, command).await;
    }
}

/// Drive `session` until it reaches [`ConnectionState::Disconnected`].
///
/// Returns the session's final counters.
pub async fn run_session<T: GattTransport + ?Sized>(
    mut session: ConnectionSession,
    transport: Arc<T>,
    mut events: mpsc::UnboundedReceiver<LinkEvent>,
    mut control: mpsc::UnboundedReceiver<Control>,
    state_tx: watch::Sender<ConnectionState>,
) -> SessionStats {
    let mut control_open = true;

    let command = session.start();
    state_tx.send_replace(session.state());
    execute_or_disconnect(
        &mut session,
        transport.as_ref(),
        command,
        &mut control,
        &mut control_open,
    )
    .await;
    state_tx.send_replace(session.state());

    while !session.state().is_terminal() {
        // Transport events already queued are handled before user requests.
        tokio::select! {
            biased;

            event = events.recv() => {
                let command = match event {
                    Some(event) => session.handle(event),
                    None => {
                        debug!("Transport event channel closed");
                        session.on_link_lost();
                        None
                    }
                };
                execute_or_disconnect(
                    &mut session,
                    transport.as_ref(),
                    command,
                    &mut control,
                    &mut control_open,
                )
                .await;
            }
            request = control.recv(), if control_open => {
                match request {
                    Some(Control::Disconnect) => {
                        let command = session.request_disconnect();
                        execute(&mut session, transport.as_ref(), command).await;
                    }
                    None => control_open = false,
                }
            }
        }

        state_tx.send_replace(session.state());
    }

    session.stats()
}

/// Handle to a session running on its own task.
#[derive(Debug)]
pub struct SessionHandle {
    control: mpsc::UnboundedSender<Control>,
    state: watch::Receiver<ConnectionState>,
    task: JoinHandle<SessionStats>,
}

impl SessionHandle {
    /// Request an explicit disconnect. Returns false if the session is gone.
    pub fn disconnect(&self) -> bool {
        self.control.send(Control::Disconnect).is_ok()
    }

    /// Last published state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Wait until the session reaches `target`.
    ///
    /// Returns false if the session ended first.
    pub async fn wait_for_state(&mut self, target: ConnectionState) -> bool {
        self.state.wait_for(|state| *state == target).await.is_ok()
    }

    /// Wait for the session to end and return its counters.
    pub async fn wait(self) -> Result<SessionStats> {
        self.task.await.map_err(|e| Error::ConnectionFailed {
            reason: format!("Session task failed: {}", e),
        })
    }
}

/// Spawn `session` on the runtime, driven by `transport` and `events`.
pub fn spawn_session<T>(
    session: ConnectionSession,
    transport: Arc<T>,
    events: mpsc::UnboundedReceiver<LinkEvent>,
) -> SessionHandle
where
    T: GattTransport + ?Sized + 'static,
{
    let (control, control_rx) = mpsc::unbounded_channel();
    let (state_tx, state) = watch::channel(session.state());

    let task = tokio::spawn(run_session(
        session, transport, events, control_rx, state_tx,
    ));

    SessionHandle {
        control,
        state,
        task,
    }
}

/// Finds one band and records sessions from it.
pub struct BandRecorder {
    scanner: BandScanner,
    settings: SessionSettings,
    storage: Arc<dyn StorageProvider>,
    remote: Option<Arc<RemoteStreamSink>>,
    status: Arc<dyn StatusReporter>,
    scan_window: Duration,
    connect_attempts: u32,
    retry_delay: Duration,
}

impl BandRecorder {
    /// Create a recorder.
    pub fn new(
        scanner: BandScanner,
        settings: SessionSettings,
        storage: Arc<dyn StorageProvider>,
        status: Arc<dyn StatusReporter>,
    ) -> Self {
        Self {
            scanner,
            settings,
            storage,
            remote: None,
            status,
            scan_window: DEFAULT_SCAN_WINDOW,
            connect_attempts: 3,
            retry_delay: Duration::from_secs(1),
        }
    }

    /// Forward samples to `remote` as well.
    pub fn with_remote(mut self, remote: Arc<RemoteStreamSink>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Set the discovery window.
    pub fn with_scan_window(mut self, window: Duration) -> Self {
        self.scan_window = window;
        self
    }

    /// Set the connection retry policy used with auto-reconnect.
    pub fn with_connect_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.connect_attempts = attempts;
        self.retry_delay = delay;
        self
    }

    /// Scan for the configured band.
    ///
    /// Returns `None` if the window elapsed without a match or a running
    /// scan was stopped.
    pub async fn find_band(&self) -> Result<Option<DiscoveredBand>> {
        let name = &self.settings.display_name;
        self.status.set_status(&format!("Looking for {}", name));

        match self.scanner.scan(name, self.scan_window).await {
            Ok(ScanOutcome::Found(band)) => Ok(Some(band)),
            Ok(ScanOutcome::TimedOut) => {
                info!("{} not found within {:?}", name, self.scan_window);
                Ok(None)
            }
            Ok(ScanOutcome::Stopped) => Ok(None),
            Err(e) => {
                warn!("BLE scan failed: {}", e);
                self.status.set_status("BLE scan failed");
                Err(e)
            }
        }
    }

    /// Start a new session against `band`.
    pub fn start_session(&self, band: DiscoveredBand) -> SessionHandle {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let transport = Arc::new(
            BtleTransport::new(band.peripheral, band.adapter, event_tx)
                .with_connect_retry(self.connect_attempts, self.retry_delay),
        );

        let session = ConnectionSession::new(
            self.settings.clone(),
            self.storage.clone(),
            self.remote.clone(),
            self.status.clone(),
        );

        info!("Starting session with {} ({})", band.name, band.identifier);
        spawn_session(session, transport, event_rx)
    }

    /// The scanner.
    pub fn scanner(&self) -> &BandScanner {
        &self.scanner
    }

    /// Session settings.
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }
}
