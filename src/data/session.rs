//! Per-connection session state.
//!
//! A [`Session`] lives from link-established to link-torn-down. Reconnecting
//! always builds a new one, with a new zero point and a new log file.

use chrono::{DateTime, Local};

use super::sequencer::SampleSequencer;
use crate::sink::LocalLogSink;

/// Counters kept for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionStats {
    /// Notifications received from the data characteristic.
    pub frames_received: u64,
    /// Frames dropped for having the wrong length.
    pub malformed: u64,
    /// Frames rejected by the sequencer.
    pub duplicates: u64,
    /// Samples emitted to the sinks.
    pub accepted: u64,
    /// Local log appends that failed.
    pub log_failures: u64,
    /// Samples the remote sink did not schedule.
    pub remote_dropped: u64,
}

/// State owned by one connection.
#[derive(Debug)]
pub struct Session {
    started_at: DateTime<Local>,
    sequencer: SampleSequencer,
    log: Option<LocalLogSink>,
    stats: SessionStats,
}

impl Session {
    /// Start a session for `device_id`.
    ///
    /// `log` is `None` when local storage could not be opened; the session
    /// still streams.
    pub fn new(
        device_id: impl Into<String>,
        started_at: DateTime<Local>,
        log: Option<LocalLogSink>,
    ) -> Self {
        Self {
            started_at,
            sequencer: SampleSequencer::new(device_id),
            log,
            stats: SessionStats::default(),
        }
    }

    /// Wall-clock time the link was established.
    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    /// The session's sequencer.
    pub fn sequencer_mut(&mut self) -> &mut SampleSequencer {
        &mut self.sequencer
    }

    /// Read-only access to the sequencer.
    pub fn sequencer(&self) -> &SampleSequencer {
        &self.sequencer
    }

    /// The session log, if one is open.
    pub fn log(&self) -> Option<&LocalLogSink> {
        self.log.as_ref()
    }

    /// Take the log out of the session for teardown.
    pub fn take_log(&mut self) -> Option<LocalLogSink> {
        self.log.take()
    }

    /// Session counters.
    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Mutable session counters.
    pub fn stats_mut(&mut self) -> &mut SessionStats {
        &mut self.stats
    }
}
