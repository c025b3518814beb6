//! HTTP client for the record ingestion gateway.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::trace;

use super::credentials::CredentialsProvider;
use super::remote::IngestClient;
use crate::error::{Error, Result};

/// Header carrying the partition key of a record.
pub const PARTITION_KEY_HEADER: &str = "X-Partition-Key";

/// Header carrying the region of the target stream.
pub const REGION_HEADER: &str = "X-Region";

/// Posts records to `{endpoint}/streams/{stream}/records`.
pub struct HttpIngestClient {
    endpoint: String,
    region: String,
    credentials: Arc<dyn CredentialsProvider>,
    client: reqwest::Client,
}

impl HttpIngestClient {
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Create a client for an ingestion gateway.
    pub fn new(
        endpoint: impl Into<String>,
        region: impl Into<String>,
        credentials: Arc<dyn CredentialsProvider>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            region: region.into(),
            credentials,
            client,
        })
    }

    /// URL records for `stream_name` are posted to.
    pub fn records_url(&self, stream_name: &str) -> String {
        format!("{}/streams/{}/records", self.endpoint, stream_name)
    }

    /// The configured region.
    pub fn region(&self) -> &str {
        &self.region
    }
}

#[async_trait]
impl IngestClient for HttpIngestClient {
    async fn put_record(&self, stream_name: &str, partition_key: &str, data: Bytes) -> Result<()> {
        let credentials = self.credentials.credentials()?;
        let url = self.records_url(stream_name);

        trace!("PUT record {} bytes to {} (key {})", data.len(), url, partition_key);

        let response = self
            .client
            .post(&url)
            .basic_auth(
                &credentials.access_key_id,
                Some(&credentials.secret_access_key),
            )
            .header(PARTITION_KEY_HEADER, partition_key)
            .header(REGION_HEADER, &self.region)
            .header("Content-Type", "application/json")
            .body(data)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::RemoteRejected {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}

impl std::fmt::Debug for HttpIngestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpIngestClient")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .finish()
    }
}
