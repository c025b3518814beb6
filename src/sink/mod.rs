//! Sample sinks.
//!
//! Every accepted sample fans out to a per-session local log and to a
//! best-effort remote stream. Neither sink can fail a session.

pub mod credentials;
pub mod http;
pub mod local_log;
pub mod remote;
pub mod storage;

pub use credentials::{Credentials, CredentialsProvider, EnvCredentials, StaticCredentials};
pub use http::HttpIngestClient;
pub use local_log::{session_file_name, LocalLogSink};
pub use remote::{DropReason, IngestClient, RemoteStreamSink, SendOutcome};
pub use storage::{FsStorage, StorageProvider};
