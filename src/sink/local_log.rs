//! Append-only session log.
//!
//! One CSV-style text file per session, one line per accepted sample:
//! `timestamp_ms,x,y,z`.

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, TimeZone};
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::storage::StorageProvider;
use crate::data::Sample;
use crate::error::{Error, Result};

/// Build the log file name for a session started at `started_at`.
///
/// Second resolution; two sessions started within the same second share a
/// name and the later one replaces the earlier file.
pub fn session_file_name<Tz: TimeZone>(started_at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{}.csv", started_at.format("%Y-%m-%d-%H-%M-%S"))
}

/// Writer for a single session's log file.
///
/// Appends and close are serialized by an internal lock. Once close has
/// begun no further lines are accepted, so a line is either fully in the
/// flushed file or not in it at all.
pub struct LocalLogSink {
    file_name: String,
    writer: Mutex<Option<Box<dyn Write + Send>>>,
    lines_written: AtomicU64,
}

impl LocalLogSink {
    /// Create the log for a session started at `started_at`.
    pub fn open<Tz: TimeZone>(
        storage: &dyn StorageProvider,
        started_at: &DateTime<Tz>,
    ) -> Result<Self>
    where
        Tz::Offset: std::fmt::Display,
    {
        if !storage.is_available() {
            return Err(Error::StorageUnavailable {
                path: storage.location(),
            });
        }

        let file_name = session_file_name(started_at);
        let writer = storage.create_log(&file_name)?;

        debug!("Opened session log {} in {}", file_name, storage.location());

        Ok(Self::from_writer(file_name, writer))
    }

    /// Wrap an already-open writer.
    pub fn from_writer(file_name: impl Into<String>, writer: Box<dyn Write + Send>) -> Self {
        Self {
            file_name: file_name.into(),
            writer: Mutex::new(Some(writer)),
            lines_written: AtomicU64::new(0),
        }
    }

    /// Append one sample as a log line.
    ///
    /// A failed write is returned to the caller; the log stays open.
    pub fn append(&self, sample: &Sample) -> Result<()> {
        let line = sample.to_log_line();

        let mut guard = self.writer.lock();
        let writer = guard.as_mut().ok_or(Error::LogClosed)?;
        writer.write_all(line.as_bytes())?;

        self.lines_written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Flush and close the log. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        let writer = self.writer.lock().take();

        match writer {
            Some(mut writer) => {
                writer.flush()?;
                debug!(
                    "Closed session log {} ({} lines)",
                    self.file_name,
                    self.lines_written()
                );
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Whether close has been called.
    pub fn is_closed(&self) -> bool {
        self.writer.lock().is_none()
    }

    /// The file name of this log.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Number of lines appended so far.
    pub fn lines_written(&self) -> u64 {
        self.lines_written.load(Ordering::Relaxed)
    }
}

impl Drop for LocalLogSink {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to flush session log {}: {}", self.file_name, e);
        }
    }
}

impl std::fmt::Debug for LocalLogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalLogSink")
            .field("file_name", &self.file_name)
            .field("lines_written", &self.lines_written())
            .field("closed", &self.is_closed())
            .finish()
    }
}
