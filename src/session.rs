//! Connection session state machine.
//!
//! A [`ConnectionSession`] owns one connection attempt from discovery match
//! to teardown. It has one entry point per [`LinkEvent`] and never performs
//! I/O against the radio itself: each entry point may return a
//! [`SessionCommand`] for the driver to execute. Every event is accepted in
//! every state; events that make no sense in the current state are ignored.

use std::sync::Arc;

use chrono::Local;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::ble::connection::ConnectionState;
use crate::ble::transport::{GattCharacteristic, GattService, LinkEvent};
use crate::ble::uuids::{uuid_matches, ACCELERATION_CHARACTERISTIC_UUID, BAND_SERVICE_UUID};
use crate::data::{Rejected, Sample, Session, SessionStats};
use crate::protocol::{DecodeError, SensorFrame};
use crate::sink::{LocalLogSink, RemoteStreamSink, StorageProvider};
use crate::status::{ButtonState, StatusReporter};

/// Static parameters of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Band identifier, used as the sample device id and partition key.
    pub device_id: String,
    /// Name shown in status texts, e.g. `BP07`.
    pub display_name: String,
    /// Identifier of the sensor service.
    pub service_uuid: String,
    /// Identifier of the data characteristic.
    pub characteristic_uuid: String,
    /// Let the transport retry link establishment.
    pub auto_reconnect: bool,
}

impl SessionSettings {
    /// Settings for the band advertising as `name_prefix` + `device_id`.
    pub fn new(name_prefix: &str, device_id: impl Into<String>) -> Self {
        let device_id = device_id.into();
        Self {
            display_name: format!("{}{}", name_prefix, device_id),
            device_id,
            service_uuid: BAND_SERVICE_UUID.to_string(),
            characteristic_uuid: ACCELERATION_CHARACTERISTIC_UUID.to_string(),
            auto_reconnect: true,
        }
    }
}

/// Work the driver must perform on the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Establish the link.
    Connect {
        /// Allow transport-level retries.
        auto_reconnect: bool,
    },
    /// Run GATT service discovery.
    DiscoverServices,
    /// Write the notification-enable descriptor.
    EnableNotifications(GattCharacteristic),
    /// Tear the link down.
    Disconnect,
}

/// What happened to one inbound notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame produced a sample, which was fanned out to the sinks.
    Accepted(Sample),
    /// The frame had the wrong length.
    Malformed(DecodeError),
    /// The sequencer rejected the reading.
    Duplicate(Rejected),
    /// Not a data frame for this session in its current state.
    Ignored,
}

/// State machine for one band connection.
pub struct ConnectionSession {
    settings: SessionSettings,
    state: ConnectionState,
    storage: Arc<dyn StorageProvider>,
    remote: Option<Arc<RemoteStreamSink>>,
    status: Arc<dyn StatusReporter>,
    /// Present between link-established and teardown.
    session: Option<Session>,
    /// Characteristic notifications are taken from.
    target: Option<GattCharacteristic>,
    /// Counters of the last torn-down session.
    final_stats: SessionStats,
}

impl ConnectionSession {
    /// Create a session in [`ConnectionState::Idle`].
    pub fn new(
        settings: SessionSettings,
        storage: Arc<dyn StorageProvider>,
        remote: Option<Arc<RemoteStreamSink>>,
        status: Arc<dyn StatusReporter>,
    ) -> Self {
        Self {
            settings,
            state: ConnectionState::Idle,
            storage,
            remote,
            status,
            session: None,
            target: None,
            final_stats: SessionStats::default(),
        }
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Session settings.
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Counters of the live session, or of the last one after teardown.
    pub fn stats(&self) -> SessionStats {
        self.session
            .as_ref()
            .map(Session::stats)
            .unwrap_or(self.final_stats)
    }

    /// Name of the open log file, if any.
    pub fn log_file_name(&self) -> Option<&str> {
        self.session
            .as_ref()
            .and_then(Session::log)
            .map(LocalLogSink::file_name)
    }

    /// Characteristic selected for notifications.
    pub fn target_characteristic(&self) -> Option<&GattCharacteristic> {
        self.target.as_ref()
    }

    fn transition(&mut self, next: ConnectionState) {
        debug!("{}: {} -> {}", self.settings.display_name, self.state, next);
        self.state = next;
    }

    /// Begin connecting after a discovery match.
    pub fn start(&mut self) -> Option<SessionCommand> {
        if self.state != ConnectionState::Idle {
            trace!("start ignored in {}", self.state);
            return None;
        }

        self.status
            .set_status(&format!("Found {}. Connecting ..", self.settings.display_name));
        self.transition(ConnectionState::Connecting);

        Some(SessionCommand::Connect {
            auto_reconnect: self.settings.auto_reconnect,
        })
    }

    /// Dispatch a transport event to its handler.
    pub fn handle(&mut self, event: LinkEvent) -> Option<SessionCommand> {
        match event {
            LinkEvent::Connected => self.on_link_established(),
            LinkEvent::Disconnected => {
                self.on_link_lost();
                None
            }
            LinkEvent::ServicesDiscovered(services) => self.on_services_discovered(&services),
            LinkEvent::DescriptorWritten {
                characteristic,
                success,
            } => {
                self.on_descriptor_written(&characteristic, success);
                None
            }
            LinkEvent::CharacteristicChanged {
                characteristic,
                value,
            } => {
                self.on_characteristic_changed(&characteristic, &value);
                None
            }
        }
    }

    /// The link is up: start a fresh session and ask for service discovery.
    ///
    /// The session log is opened here. If storage is unavailable the session
    /// continues without it.
    pub fn on_link_established(&mut self) -> Option<SessionCommand> {
        if self.state != ConnectionState::Connecting {
            trace!("link-established ignored in {}", self.state);
            return None;
        }

        let started_at = Local::now();
        let log = match LocalLogSink::open(self.storage.as_ref(), &started_at) {
            Ok(log) => Some(log),
            Err(e) => {
                warn!("Session log unavailable, streaming without it: {}", e);
                None
            }
        };

        self.session = Some(Session::new(
            self.settings.device_id.clone(),
            started_at,
            log,
        ));

        info!("Connected to {}", self.settings.display_name);
        self.status
            .set_status(&format!("Connected to {}", self.settings.display_name));
        self.status.set_connect_button(ButtonState::Disconnect);

        self.transition(ConnectionState::ServiceDiscovery);
        self.status.set_status("Discovering Services");

        Some(SessionCommand::DiscoverServices)
    }

    /// Pick the target service and characteristic.
    ///
    /// If either is missing, or the characteristic cannot notify, the session
    /// stays in [`ConnectionState::ServiceDiscovery`] and produces no samples.
    pub fn on_services_discovered(&mut self, services: &[GattService]) -> Option<SessionCommand> {
        if self.state != ConnectionState::ServiceDiscovery || self.target.is_some() {
            trace!("services-discovered ignored in {}", self.state);
            return None;
        }

        let Some(service) = services
            .iter()
            .find(|s| uuid_matches(&s.uuid, &self.settings.service_uuid))
        else {
            warn!(
                "Service {} not found on {} ({} services); session parked",
                self.settings.service_uuid,
                self.settings.display_name,
                services.len()
            );
            return None;
        };

        self.status.set_status("Retrieving Characteristics");

        let Some(characteristic) = service
            .characteristics
            .iter()
            .find(|c| uuid_matches(&c.uuid, &self.settings.characteristic_uuid))
        else {
            warn!(
                "Characteristic {} not found in service {}; session parked",
                self.settings.characteristic_uuid, service.uuid
            );
            return None;
        };

        if !characteristic.notify {
            warn!(
                "Characteristic {} does not support notifications; session parked",
                characteristic.uuid
            );
            self.status.set_status("Notification Not Supported");
            return None;
        }

        self.status.set_status("Notification supported");
        self.target = Some(characteristic.clone());
        self.transition(ConnectionState::Subscribing);

        Some(SessionCommand::EnableNotifications(characteristic.clone()))
    }

    /// The descriptor write has been issued.
    ///
    /// Streaming starts without waiting for the write to be confirmed.
    pub fn on_subscription_issued(&mut self) {
        if self.state != ConnectionState::Subscribing {
            trace!("subscription-issued ignored in {}", self.state);
            return;
        }

        self.transition(ConnectionState::Streaming);
        self.status.set_status("Notification subscribed");
    }

    /// The descriptor write completed.
    pub fn on_descriptor_written(&mut self, characteristic: &Uuid, success: bool) {
        let is_target = self
            .target
            .as_ref()
            .is_some_and(|t| t.uuid == *characteristic);
        if !is_target {
            trace!("descriptor-written for {} ignored", characteristic);
            return;
        }

        if !success {
            warn!("Notification enable for {} was not confirmed", characteristic);
            return;
        }

        debug!("Notification enable for {} confirmed", characteristic);
        self.on_subscription_issued();
    }

    /// Process one notification.
    pub fn on_characteristic_changed(&mut self, characteristic: &Uuid, value: &[u8]) -> FrameOutcome {
        if !self.state.accepts_frames() {
            trace!("notification ignored in {}", self.state);
            return FrameOutcome::Ignored;
        }
        let is_target = self
            .target
            .as_ref()
            .is_some_and(|t| t.uuid == *characteristic);
        let Some(session) = self.session.as_mut().filter(|_| is_target) else {
            trace!("notification from {} ignored", characteristic);
            return FrameOutcome::Ignored;
        };

        session.stats_mut().frames_received += 1;

        let frame = match SensorFrame::decode(value) {
            Ok(frame) => frame,
            Err(e) => {
                trace!("Dropping frame: {}", e);
                session.stats_mut().malformed += 1;
                return FrameOutcome::Malformed(e);
            }
        };

        let sample = match session.sequencer_mut().accept(
            frame.device_timestamp_ms(),
            frame.x,
            frame.y,
            frame.z,
        ) {
            Ok(sample) => sample,
            Err(rejected) => {
                trace!("Dropping reading: {:?}", rejected);
                session.stats_mut().duplicates += 1;
                return FrameOutcome::Duplicate(rejected);
            }
        };

        let line = sample.to_log_line();
        self.status.set_status(line.trim_end());

        let log_failed = match session.log().map(|log| (log, log.append(&sample))) {
            Some((log, Err(e))) => {
                warn!("Failed to append to {}: {}", log.file_name(), e);
                true
            }
            _ => false,
        };
        if log_failed {
            session.stats_mut().log_failures += 1;
        }

        if let Some(remote) = &self.remote {
            if !remote.send(&sample).is_scheduled() {
                session.stats_mut().remote_dropped += 1;
            }
        }

        session.stats_mut().accepted += 1;
        FrameOutcome::Accepted(sample)
    }

    /// The transport reported the link gone.
    pub fn on_link_lost(&mut self) {
        if self.state.is_terminal() {
            trace!("link-lost ignored, already disconnected");
            return;
        }

        info!("Link to {} lost", self.settings.display_name);
        self.teardown();
    }

    /// Explicit disconnect from the user.
    ///
    /// Teardown happens immediately. The returned command, if any, tells the
    /// driver to release the link.
    pub fn request_disconnect(&mut self) -> Option<SessionCommand> {
        if self.state.is_terminal() {
            return None;
        }

        let had_link = self.state != ConnectionState::Idle;
        info!("Disconnect requested for {}", self.settings.display_name);
        self.teardown();

        had_link.then_some(SessionCommand::Disconnect)
    }

    fn teardown(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Some(log) = session.take_log() {
                if let Err(e) = log.close() {
                    warn!("Failed to close {}: {}", log.file_name(), e);
                }
            }

            self.final_stats = session.stats();
            let elapsed = Local::now() - session.started_at();
            info!(
                "Session for {} ended after {}s: {:?}",
                self.settings.display_name,
                elapsed.num_seconds(),
                self.final_stats
            );
        }

        self.target = None;
        self.transition(ConnectionState::Disconnected);
        self.status.set_status("BLE Disconnected");
        self.status.set_connect_button(ButtonState::Connect);
    }
}

impl std::fmt::Debug for ConnectionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSession")
            .field("device", &self.settings.display_name)
            .field("state", &self.state)
            .field("target", &self.target)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{DropReason, IngestClient, SendOutcome};
    use crate::status::{ChannelStatusReporter, MockStatusReporter, StatusUpdate};
    use async_trait::async_trait;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::io::{self, Write};
    use tokio::sync::mpsc;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemoryStorage {
        buf: SharedBuf,
        available: bool,
    }

    impl MemoryStorage {
        fn available() -> Arc<Self> {
            Arc::new(Self {
                buf: SharedBuf::default(),
                available: true,
            })
        }

        fn contents(&self) -> String {
            String::from_utf8(self.buf.0.lock().clone()).unwrap()
        }
    }

    impl StorageProvider for MemoryStorage {
        fn is_available(&self) -> bool {
            self.available
        }

        fn create_log(&self, _file_name: &str) -> io::Result<Box<dyn Write + Send>> {
            Ok(Box::new(self.buf.clone()))
        }

        fn location(&self) -> String {
            "memory".to_string()
        }
    }

    struct NullClient;

    #[async_trait]
    impl IngestClient for NullClient {
        async fn put_record(&self, _: &str, _: &str, _: Bytes) -> crate::error::Result<()> {
            Ok(())
        }
    }

    fn band_service(notify: bool) -> GattService {
        GattService {
            uuid: BAND_SERVICE_UUID,
            characteristics: vec![
                GattCharacteristic {
                    uuid: crate::ble::uuids::PPG_CHARACTERISTIC_UUID,
                    service_uuid: BAND_SERVICE_UUID,
                    notify: true,
                },
                GattCharacteristic {
                    uuid: ACCELERATION_CHARACTERISTIC_UUID,
                    service_uuid: BAND_SERVICE_UUID,
                    notify,
                },
            ],
        }
    }

    fn frame(x: i16, y: i16, z: i16, ticks: u32) -> Vec<u8> {
        SensorFrame { x, y, z, ticks }.encode().to_vec()
    }

    fn new_session(
        storage: Arc<dyn StorageProvider>,
        remote: Option<Arc<RemoteStreamSink>>,
    ) -> (ConnectionSession, mpsc::UnboundedReceiver<StatusUpdate>) {
        let (reporter, rx) = ChannelStatusReporter::new();
        let session = ConnectionSession::new(
            SessionSettings::new("BP", "07"),
            storage,
            remote,
            Arc::new(reporter),
        );
        (session, rx)
    }

    fn streaming_session(
        storage: Arc<dyn StorageProvider>,
    ) -> (ConnectionSession, mpsc::UnboundedReceiver<StatusUpdate>) {
        let (mut session, rx) = new_session(storage, None);
        session.start();
        session.handle(LinkEvent::Connected);
        session.handle(LinkEvent::ServicesDiscovered(vec![band_service(true)]));
        session.on_subscription_issued();
        assert_eq!(session.state(), ConnectionState::Streaming);
        (session, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<StatusUpdate>) -> Vec<StatusUpdate> {
        let mut updates = Vec::new();
        while let Ok(update) = rx.try_recv() {
            updates.push(update);
        }
        updates
    }

    fn status(text: &str) -> StatusUpdate {
        StatusUpdate::Status(text.to_string())
    }

    #[test]
    fn test_settings_defaults() {
        let settings = SessionSettings::new("BP", "07");
        assert_eq!(settings.display_name, "BP07");
        assert_eq!(settings.device_id, "07");
        assert_eq!(settings.service_uuid, "f3641400-00b0-4240-ba50-05ca45bf8abc");
        assert_eq!(
            settings.characteristic_uuid,
            "f3641404-00b0-4240-ba50-05ca45bf8abc"
        );
        assert!(settings.auto_reconnect);
    }

    #[test]
    fn test_negotiation_commands() {
        let (mut session, mut rx) = new_session(MemoryStorage::available(), None);
        assert_eq!(session.state(), ConnectionState::Idle);

        assert_eq!(
            session.start(),
            Some(SessionCommand::Connect {
                auto_reconnect: true
            })
        );
        assert_eq!(session.state(), ConnectionState::Connecting);

        assert_eq!(
            session.handle(LinkEvent::Connected),
            Some(SessionCommand::DiscoverServices)
        );
        assert_eq!(session.state(), ConnectionState::ServiceDiscovery);
        assert!(session.log_file_name().is_some());

        let command = session.handle(LinkEvent::ServicesDiscovered(vec![band_service(true)]));
        match command {
            Some(SessionCommand::EnableNotifications(c)) => {
                assert_eq!(c.uuid, ACCELERATION_CHARACTERISTIC_UUID)
            }
            other => panic!("Expected EnableNotifications, got {:?}", other),
        }
        assert_eq!(session.state(), ConnectionState::Subscribing);

        session.on_subscription_issued();
        assert_eq!(session.state(), ConnectionState::Streaming);

        assert_eq!(
            drain(&mut rx),
            vec![
                status("Found BP07. Connecting .."),
                status("Connected to BP07"),
                StatusUpdate::Button(ButtonState::Disconnect),
                status("Discovering Services"),
                status("Retrieving Characteristics"),
                status("Notification supported"),
                status("Notification subscribed"),
            ]
        );
    }

    #[test]
    fn test_frames_accepted_while_subscribing() {
        let storage = MemoryStorage::available();
        let (mut session, _rx) = new_session(storage.clone(), None);
        session.start();
        session.handle(LinkEvent::Connected);
        session.handle(LinkEvent::ServicesDiscovered(vec![band_service(true)]));
        assert_eq!(session.state(), ConnectionState::Subscribing);

        let outcome =
            session.on_characteristic_changed(&ACCELERATION_CHARACTERISTIC_UUID, &frame(1, 2, 3, 0));
        assert!(matches!(outcome, FrameOutcome::Accepted(_)));

        session.on_descriptor_written(&ACCELERATION_CHARACTERISTIC_UUID, true);
        assert_eq!(session.state(), ConnectionState::Streaming);
    }

    #[test]
    fn test_ticks_rebased_and_logged() {
        let storage = MemoryStorage::available();
        let (mut session, mut rx) = streaming_session(storage.clone());
        drain(&mut rx);

        for ticks in [5120, 6144, 7168] {
            let outcome = session
                .on_characteristic_changed(&ACCELERATION_CHARACTERISTIC_UUID, &frame(16, -16, 0, ticks));
            assert!(matches!(outcome, FrameOutcome::Accepted(_)));
        }

        assert_eq!(
            drain(&mut rx),
            vec![status("0,16,-16,0"), status("1000,16,-16,0"), status("2000,16,-16,0")]
        );

        session.on_link_lost();
        assert_eq!(
            storage.contents(),
            "0,16,-16,0\n1000,16,-16,0\n2000,16,-16,0\n"
        );
        assert_eq!(session.stats().accepted, 3);
    }

    #[test]
    fn test_duplicate_frame_logged_once() {
        let storage = MemoryStorage::available();
        let (mut session, _rx) = streaming_session(storage.clone());

        let first = frame(1, 1, 1, 2048);
        assert!(matches!(
            session.on_characteristic_changed(&ACCELERATION_CHARACTERISTIC_UUID, &first),
            FrameOutcome::Accepted(_)
        ));
        assert!(matches!(
            session.on_characteristic_changed(&ACCELERATION_CHARACTERISTIC_UUID, &first),
            FrameOutcome::Duplicate(Rejected::Duplicate {
                device_timestamp_ms: 2000,
                last_accepted_ms: 2000
            })
        ));

        session.on_link_lost();
        assert_eq!(storage.contents(), "0,1,1,1\n");

        let stats = session.stats();
        assert_eq!(stats.frames_received, 2);
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.duplicates, 1);
    }

    #[test]
    fn test_wrong_length_dropped() {
        let (mut session, _rx) = streaming_session(MemoryStorage::available());

        for len in [9, 11] {
            let outcome =
                session.on_characteristic_changed(&ACCELERATION_CHARACTERISTIC_UUID, &vec![0u8; len]);
            assert_eq!(outcome, FrameOutcome::Malformed(DecodeError::WrongLength { len }));
        }

        assert_eq!(session.state(), ConnectionState::Streaming);
        assert_eq!(session.stats().malformed, 2);
        assert_eq!(session.stats().accepted, 0);
    }

    #[test]
    fn test_missing_service_parks_session() {
        let (mut session, mut rx) = new_session(MemoryStorage::available(), None);
        session.start();
        session.handle(LinkEvent::Connected);
        drain(&mut rx);

        let other = GattService {
            uuid: Uuid::from_u128(0x0000_180f_0000_1000_8000_00805f9b34fb),
            characteristics: Vec::new(),
        };
        assert_eq!(session.handle(LinkEvent::ServicesDiscovered(vec![other])), None);
        assert_eq!(session.state(), ConnectionState::ServiceDiscovery);

        let outcome =
            session.on_characteristic_changed(&ACCELERATION_CHARACTERISTIC_UUID, &frame(0, 0, 0, 0));
        assert_eq!(outcome, FrameOutcome::Ignored);
        session.on_subscription_issued();

        assert_eq!(session.state(), ConnectionState::ServiceDiscovery);
        assert_eq!(session.stats(), SessionStats::default());
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_missing_characteristic_parks_session() {
        let (mut session, _rx) = new_session(MemoryStorage::available(), None);
        session.start();
        session.handle(LinkEvent::Connected);

        let service = GattService {
            uuid: BAND_SERVICE_UUID,
            characteristics: Vec::new(),
        };
        assert_eq!(session.on_services_discovered(&[service]), None);
        assert_eq!(session.state(), ConnectionState::ServiceDiscovery);
        assert!(session.target_characteristic().is_none());
    }

    #[test]
    fn test_notify_not_supported_reported() {
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let mut reporter = MockStatusReporter::new();
        let recorded = seen.clone();
        reporter
            .expect_set_status()
            .returning(move |text| recorded.lock().push(text.to_string()));
        reporter
            .expect_set_connect_button()
            .with(mockall::predicate::eq(ButtonState::Disconnect))
            .times(1)
            .return_const(());

        let mut session = ConnectionSession::new(
            SessionSettings::new("BP", "07"),
            MemoryStorage::available(),
            None,
            Arc::new(reporter),
        );
        session.start();
        session.handle(LinkEvent::Connected);
        assert_eq!(
            session.handle(LinkEvent::ServicesDiscovered(vec![band_service(false)])),
            None
        );

        assert_eq!(session.state(), ConnectionState::ServiceDiscovery);
        let seen = seen.lock();
        assert_eq!(seen.last().map(String::as_str), Some("Notification Not Supported"));
        assert!(!seen.iter().any(|s| s == "Notification subscribed"));
    }

    #[test]
    fn test_service_match_is_case_insensitive_substring() {
        let (reporter, _rx) = ChannelStatusReporter::new();
        let mut settings = SessionSettings::new("BP", "07");
        settings.service_uuid = "F3641400".to_string();
        settings.characteristic_uuid = "f3641404".to_string();
        let mut session =
            ConnectionSession::new(settings, MemoryStorage::available(), None, Arc::new(reporter));

        session.start();
        session.handle(LinkEvent::Connected);
        assert!(matches!(
            session.handle(LinkEvent::ServicesDiscovered(vec![band_service(true)])),
            Some(SessionCommand::EnableNotifications(_))
        ));
    }

    #[test]
    fn test_other_characteristic_ignored() {
        let (mut session, _rx) = streaming_session(MemoryStorage::available());
        let outcome = session.on_characteristic_changed(
            &crate::ble::uuids::PPG_CHARACTERISTIC_UUID,
            &frame(0, 0, 0, 0),
        );
        assert_eq!(outcome, FrameOutcome::Ignored);
        assert_eq!(session.stats().frames_received, 0);
    }

    #[test]
    fn test_unexpected_events_are_noops() {
        let (mut session, mut rx) = new_session(MemoryStorage::available(), None);

        assert_eq!(session.handle(LinkEvent::Connected), None);
        assert_eq!(
            session.handle(LinkEvent::ServicesDiscovered(vec![band_service(true)])),
            None
        );
        session.on_subscription_issued();
        assert_eq!(session.state(), ConnectionState::Idle);
        assert!(drain(&mut rx).is_empty());

        session.start();
        assert_eq!(session.start(), None);
        session.handle(LinkEvent::Connected);
        assert_eq!(session.handle(LinkEvent::Connected), None);
        assert_eq!(session.state(), ConnectionState::ServiceDiscovery);
    }

    #[test]
    fn test_link_lost_is_terminal() {
        let storage = MemoryStorage::available();
        let (mut session, mut rx) = streaming_session(storage.clone());
        session.on_characteristic_changed(&ACCELERATION_CHARACTERISTIC_UUID, &frame(1, 2, 3, 0));
        drain(&mut rx);

        session.handle(LinkEvent::Disconnected);
        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert!(session.log_file_name().is_none());
        assert_eq!(
            drain(&mut rx),
            vec![
                status("BLE Disconnected"),
                StatusUpdate::Button(ButtonState::Connect)
            ]
        );

        // Nothing revives a torn-down session.
        assert_eq!(session.start(), None);
        assert_eq!(session.handle(LinkEvent::Connected), None);
        assert_eq!(
            session.on_characteristic_changed(&ACCELERATION_CHARACTERISTIC_UUID, &frame(1, 2, 3, 1024)),
            FrameOutcome::Ignored
        );
        session.handle(LinkEvent::Disconnected);
        assert!(drain(&mut rx).is_empty());

        assert_eq!(session.stats().accepted, 1);
        assert_eq!(storage.contents(), "0,1,2,3\n");
    }

    #[test]
    fn test_request_disconnect() {
        let (mut session, _rx) = streaming_session(MemoryStorage::available());
        assert_eq!(session.request_disconnect(), Some(SessionCommand::Disconnect));
        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert_eq!(session.request_disconnect(), None);

        let (mut idle, _rx) = new_session(MemoryStorage::available(), None);
        assert_eq!(idle.request_disconnect(), None);
        assert_eq!(idle.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_streams_without_storage() {
        let storage = Arc::new(MemoryStorage::default());
        let (mut session, _rx) = streaming_session(storage.clone());
        assert!(session.log_file_name().is_none());

        let outcome =
            session.on_characteristic_changed(&ACCELERATION_CHARACTERISTIC_UUID, &frame(1, 2, 3, 0));
        assert!(matches!(outcome, FrameOutcome::Accepted(_)));
        assert_eq!(session.stats().log_failures, 0);
        assert_eq!(storage.contents(), "");
    }

    #[test]
    fn test_remote_drop_counted_without_runtime() {
        let remote = Arc::new(RemoteStreamSink::new(
            "acceleration",
            "us-east-1",
            Arc::new(NullClient),
        ));
        let (mut session, _rx) = new_session(MemoryStorage::available(), Some(remote.clone()));
        session.start();
        session.handle(LinkEvent::Connected);
        session.handle(LinkEvent::ServicesDiscovered(vec![band_service(true)]));

        session.on_characteristic_changed(&ACCELERATION_CHARACTERISTIC_UUID, &frame(1, 2, 3, 0));

        assert_eq!(session.stats().remote_dropped, 1);
        assert_eq!(session.stats().accepted, 1);
        assert_eq!(remote.dropped_count(), 1);
        assert_eq!(
            remote.send(&Sample::new("07", 0, 0, 0, 0)),
            SendOutcome::Dropped(DropReason::NoRuntime)
        );
    }

    #[tokio::test]
    async fn test_remote_scheduled_inside_runtime() {
        let remote = Arc::new(RemoteStreamSink::new(
            "acceleration",
            "us-east-1",
            Arc::new(NullClient),
        ));
        let (mut session, _rx) = new_session(MemoryStorage::available(), Some(remote.clone()));
        session.start();
        session.handle(LinkEvent::Connected);
        session.handle(LinkEvent::ServicesDiscovered(vec![band_service(true)]));

        session.on_characteristic_changed(&ACCELERATION_CHARACTERISTIC_UUID, &frame(1, 2, 3, 0));

        assert_eq!(session.stats().remote_dropped, 0);
        assert_eq!(remote.scheduled_count(), 1);
    }
}
