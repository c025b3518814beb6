//! Best-effort forwarding of samples to a remote record stream.
//!
//! Each sample becomes one JSON record, partitioned by device id. Sends are
//! fire-and-forget: [`RemoteStreamSink::send`] returns once the request is
//! scheduled on the async runtime, and delivery failures are only counted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, warn};

use crate::data::Sample;
use crate::error::Result;

/// Client capable of submitting records to a named stream.
#[async_trait]
pub trait IngestClient: Send + Sync {
    /// Submit one record. Resolves when the remote side has answered.
    async fn put_record(&self, stream_name: &str, partition_key: &str, data: Bytes) -> Result<()>;
}

/// Why a sample was not scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The sample could not be encoded.
    Serialization,
    /// There is no async runtime to schedule the request on.
    NoRuntime,
}

/// Result of [`RemoteStreamSink::send`].
///
/// `Scheduled` says nothing about delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The request was handed to the runtime.
    Scheduled,
    /// The sample was discarded before any request was made.
    Dropped(DropReason),
}

impl SendOutcome {
    /// Check if the request was scheduled.
    pub fn is_scheduled(&self) -> bool {
        matches!(self, Self::Scheduled)
    }
}

#[derive(Debug, Default)]
struct Counters {
    scheduled: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

/// Forwarder for one logical stream.
pub struct RemoteStreamSink {
    stream_name: String,
    region: String,
    client: Arc<dyn IngestClient>,
    counters: Arc<Counters>,
}

impl RemoteStreamSink {
    /// Create a sink for `stream_name` in `region`.
    pub fn new(
        stream_name: impl Into<String>,
        region: impl Into<String>,
        client: Arc<dyn IngestClient>,
    ) -> Self {
        Self {
            stream_name: stream_name.into(),
            region: region.into(),
            client,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Schedule a sample for delivery.
    pub fn send(&self, sample: &Sample) -> SendOutcome {
        let payload = match sample.to_record_json() {
            Ok(json) => Bytes::from(json),
            Err(e) => {
                warn!("Failed to encode sample for {}: {}", self.stream_name, e);
                return self.drop_sample(DropReason::Serialization);
            }
        };

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                debug!("No async runtime, dropping sample for {}", self.stream_name);
                return self.drop_sample(DropReason::NoRuntime);
            }
        };

        let client = self.client.clone();
        let counters = self.counters.clone();
        let stream_name = self.stream_name.clone();
        let partition_key = sample.partition_key().to_string();

        runtime.spawn(async move {
            if let Err(e) = client.put_record(&stream_name, &partition_key, payload).await {
                debug!("Record to {} not delivered: {}", stream_name, e);
                counters.failed.fetch_add(1, Ordering::Relaxed);
            }
        });

        self.counters.scheduled.fetch_add(1, Ordering::Relaxed);
        SendOutcome::Scheduled
    }

    fn drop_sample(&self, reason: DropReason) -> SendOutcome {
        self.counters.dropped.fetch_add(1, Ordering::Relaxed);
        SendOutcome::Dropped(reason)
    }

    /// The stream records are sent to.
    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }

    /// The region of the stream.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Number of records handed to the runtime.
    pub fn scheduled_count(&self) -> u64 {
        self.counters.scheduled.load(Ordering::Relaxed)
    }

    /// Number of samples dropped before scheduling.
    pub fn dropped_count(&self) -> u64 {
        self.counters.dropped.load(Ordering::Relaxed)
    }

    /// Number of scheduled records the remote side did not accept.
    pub fn failed_count(&self) -> u64 {
        self.counters.failed.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for RemoteStreamSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteStreamSink")
            .field("stream_name", &self.stream_name)
            .field("region", &self.region)
            .field("scheduled", &self.scheduled_count())
            .field("dropped", &self.dropped_count())
            .field("failed", &self.failed_count())
            .finish()
    }
}
